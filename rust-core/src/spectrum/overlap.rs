//! Overlap-add reconstruction of banded segments
//!
//! Each frame was windowed before filtering, so the summed frames are divided
//! by the summed (overlapped) window to undo the analysis weighting.

use crate::error::{FilterBankError, Result};
use crate::sample::BandSample;
use ndarray::{s, Array3, ArrayView4};

/// Relative window sum below which samples are left unnormalized
const MIN_WEIGHT: f64 = 1e-8;

/// Reassemble per-window segments into continuous per-band signals
///
/// # Arguments
/// * `segments` - Segments shaped `[channels, windows, bands, len]`
/// * `window` - Analysis window at the segment rate (length `len`)
/// * `overlap_factor` - Hop as a fraction of `len`
///
/// # Returns
/// Signals shaped `[channels, bands, (windows - 1) * hop + len]`
pub fn overlap_add<T: BandSample>(
    segments: ArrayView4<'_, T>,
    window: &[f64],
    overlap_factor: f64,
) -> Result<Array3<T>> {
    let (nch, nwin, nbands, len) = segments.dim();
    if window.len() != len {
        return Err(FilterBankError::ShapeMismatch {
            what: "overlap-add window",
            expected: vec![len],
            actual: vec![window.len()],
        });
    }
    let hop = (len as f64 * overlap_factor).round() as usize;
    if hop == 0 || hop > len {
        return Err(FilterBankError::Configuration(format!(
            "overlap factor {} gives an invalid hop of {} for segments of {}",
            overlap_factor, hop, len
        )));
    }
    if nwin == 0 {
        return Ok(Array3::from_elem((nch, nbands, 0), T::default()));
    }

    let total = (nwin - 1) * hop + len;
    let weights = window_sum(window, nwin, hop, total);

    let mut out = Array3::from_elem((nch, nbands, total), T::default());
    for ch in 0..nch {
        for t in 0..nwin {
            let start = t * hop;
            for band in 0..nbands {
                let segment = segments.slice(s![ch, t, band, ..]);
                let mut dst = out.slice_mut(s![ch, band, start..start + len]);
                for (d, &v) in dst.iter_mut().zip(segment.iter()) {
                    *d += v;
                }
            }
        }
    }

    for mut lane in out.lanes_mut(ndarray::Axis(2)) {
        for (v, &w) in lane.iter_mut().zip(weights.iter()) {
            if let Some(w) = w {
                *v = *v * (1.0 / w);
            }
        }
    }

    Ok(out)
}

/// Overlapped window sum per output sample; `None` where it vanishes
fn window_sum(window: &[f64], nwin: usize, hop: usize, total: usize) -> Vec<Option<f64>> {
    let mut sum = vec![0.0; total];
    for t in 0..nwin {
        for (k, &w) in window.iter().enumerate() {
            sum[t * hop + k] += w;
        }
    }
    let peak = sum.iter().cloned().fold(0.0, f64::max);
    sum.into_iter()
        .map(|w| if w > peak * MIN_WEIGHT { Some(w) } else { None })
        .collect()
}
