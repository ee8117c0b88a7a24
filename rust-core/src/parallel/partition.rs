//! Splitting an axis between workers

use std::ops::Range;

/// Split `len` into `workers` contiguous ranges
///
/// Each range takes `ceil(remaining / workers_left)`, so lengths differ by at
/// most one and the ranges cover `0..len` exactly once. With more workers than
/// elements the trailing ranges are empty.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let remaining = len - start;
        let workers_left = workers - w;
        let size = (remaining + workers_left - 1) / workers_left;
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}
