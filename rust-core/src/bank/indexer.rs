//! Index arrays mapping STFT bins to bands and filter coefficients
//!
//! For band `b` and offset `k` within its window:
//! - `idx1[b, k]` is the STFT bin gathered,
//! - `idx2[b, k] == b` is the band it is scattered into,
//! - `fidx[b, k]` is the prototype response coefficient it is multiplied by.
//!
//! All three are `(nfreqs, W)` and computed once at construction.

use super::bands::BandSet;
use crate::config::LeftBoundPolicy;
use crate::error::{FilterBankError, Result};
use log::warn;
use ndarray::Array2;

/// Sampling grid the indices are computed against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleGrid {
    /// STFT window size; also the prototype response length
    pub binsize: usize,

    /// Sample rate (Hz)
    pub sample_rate: f64,

    /// Output decimation factor
    pub decimate_by: usize,
}

impl SampleGrid {
    /// STFT bins per Hz
    pub fn interval_per_hz(&self) -> f64 {
        self.binsize as f64 / self.sample_rate
    }

    /// Exclusive upper bound for gathered bins
    pub fn bin_limit(&self) -> usize {
        self.binsize / self.decimate_by / 2
    }
}

/// Gather/scatter indices, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct IndexArrays {
    pub idx1: Array2<usize>,
    pub idx2: Array2<usize>,
    pub fidx: Array2<usize>,
}

impl IndexArrays {
    /// Number of bands
    pub fn nfreqs(&self) -> usize {
        self.idx1.nrows()
    }

    /// Window length W
    pub fn window_len(&self) -> usize {
        self.idx1.ncols()
    }

    /// Check every index against the extents it addresses
    pub fn validate(&self, bin_limit: usize, filter_len: usize) -> Result<()> {
        let nfreqs = self.nfreqs();
        check_all("idx1", &self.idx1, bin_limit)?;
        check_all("idx2", &self.idx2, nfreqs)?;
        check_all("fidx", &self.fidx, filter_len)
    }
}

fn check_all(array: &'static str, values: &Array2<usize>, extent: usize) -> Result<()> {
    match values.iter().find(|&&v| v >= extent) {
        Some(&v) => Err(FilterBankError::Bounds {
            array,
            index: v as i64,
            extent,
        }),
        None => Ok(()),
    }
}

/// Builds `IndexArrays` from band definitions
#[derive(Debug, Clone, Copy)]
pub struct FrequencyIndexer {
    grid: SampleGrid,
    factor: f64,
    policy: LeftBoundPolicy,
}

impl FrequencyIndexer {
    pub fn new(grid: SampleGrid, factor: f64, policy: LeftBoundPolicy) -> Self {
        Self {
            grid,
            factor,
            policy,
        }
    }

    /// Window length W for a bandwidth
    pub fn window_len(&self, bandwidth: f64) -> usize {
        let w = (bandwidth * self.factor * 2.0 * self.grid.interval_per_hz()).round();
        if w > 0.0 {
            w as usize
        } else {
            0
        }
    }

    /// Bins left of the band center covered by the window
    fn margin(&self, bandwidth: f64) -> i64 {
        (bandwidth * self.factor * self.grid.interval_per_hz()).floor() as i64
    }

    /// Compute idx1, idx2 and fidx
    pub fn compute(&self, bands: &BandSet) -> Result<IndexArrays> {
        let bandwidth = bands.bandwidth();
        let w = self.window_len(bandwidth);
        if w == 0 {
            return Err(FilterBankError::Configuration(format!(
                "bandwidth {} Hz is narrower than one STFT bin ({} Hz)",
                bandwidth,
                1.0 / self.grid.interval_per_hz()
            )));
        }
        let limit = self.grid.bin_limit();
        if w > limit {
            return Err(FilterBankError::Configuration(format!(
                "band window of {} bins exceeds the {} available bins",
                w, limit
            )));
        }

        let margin = self.margin(bandwidth);
        let cf0 = (self.grid.binsize / 2) as i64;
        let iph = self.grid.interval_per_hz();

        // Per band: first gathered bin and first filter coefficient
        let starts: Vec<(i64, i64)> = bands
            .bands()
            .iter()
            .enumerate()
            .map(|(b, band)| {
                let cf_ix = (band.center * iph).round() as i64;
                let left = cf_ix - margin;
                match self.policy {
                    LeftBoundPolicy::FixedMargin => (left, cf0 - margin),
                    LeftBoundPolicy::DcAware => {
                        let clamped = left.clamp(0, limit as i64 - w as i64);
                        if clamped != left {
                            warn!(
                                "band {} ({} Hz): window moved from bin {} to {}",
                                b, band.center, left, clamped
                            );
                        }
                        (clamped, cf0 + clamped - cf_ix)
                    }
                }
            })
            .collect();

        // Signed pass first so a negative index is reported, not wrapped
        let signed_idx1 = Array2::from_shape_fn((bands.len(), w), |(b, k)| starts[b].0 + k as i64);
        let signed_fidx = Array2::from_shape_fn((bands.len(), w), |(b, k)| starts[b].1 + k as i64);
        let idx1 = to_unsigned("idx1", signed_idx1, limit)?;
        let fidx = to_unsigned("fidx", signed_fidx, self.grid.binsize)?;
        let idx2 = Array2::from_shape_fn((bands.len(), w), |(b, _)| b);

        let arrays = IndexArrays { idx1, idx2, fidx };
        arrays.validate(limit, self.grid.binsize)?;
        Ok(arrays)
    }
}

fn to_unsigned(array: &'static str, values: Array2<i64>, extent: usize) -> Result<Array2<usize>> {
    if let Some(&v) = values.iter().find(|&&v| v < 0 || v >= extent as i64) {
        return Err(FilterBankError::Bounds {
            array,
            index: v,
            extent,
        });
    }
    Ok(values.mapv(|v| v as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BandSpec;

    fn grid() -> SampleGrid {
        SampleGrid {
            binsize: 1024,
            sample_rate: 1000.0,
            decimate_by: 1,
        }
    }

    fn bands(centers: Vec<f64>, bandwidth: f64) -> BandSet {
        BandSet::from_spec(
            &BandSpec::Centers {
                center_freqs: centers,
                bandwidth,
            },
            500.0,
        )
        .unwrap()
    }

    #[test]
    fn test_single_band_scenario() {
        let indexer = FrequencyIndexer::new(grid(), 0.6, LeftBoundPolicy::FixedMargin);
        let arrays = indexer.compute(&bands(vec![50.0], 10.0)).unwrap();

        // 10 Hz * 0.6 * 2 * 1.024 = 12.288
        assert_eq!(arrays.window_len(), 12);
        assert_eq!(arrays.nfreqs(), 1);

        // Center bin round(51.2) = 51, margin floor(6.144) = 6
        let idx1: Vec<usize> = arrays.idx1.row(0).to_vec();
        assert_eq!(idx1, (45..57).collect::<Vec<_>>());
        let fidx: Vec<usize> = arrays.fidx.row(0).to_vec();
        assert_eq!(fidx, (506..518).collect::<Vec<_>>());
        assert!(arrays.idx2.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shapes_and_ranges_many_bands() {
        let indexer = FrequencyIndexer::new(grid(), 0.6, LeftBoundPolicy::FixedMargin);
        let centers: Vec<f64> = (1..40).map(|i| i as f64 * 12.0).collect();
        let set = bands(centers, 8.0);
        let arrays = indexer.compute(&set).unwrap();

        let shape = (set.len(), arrays.window_len());
        assert_eq!(arrays.idx1.dim(), shape);
        assert_eq!(arrays.idx2.dim(), shape);
        assert_eq!(arrays.fidx.dim(), shape);
        assert!(arrays.idx1.iter().all(|&v| v < 512));
        assert!(arrays.idx2.iter().all(|&v| v < set.len()));
        assert!(arrays.fidx.iter().all(|&v| v < 1024));

        // Every band uses the same slice of the prototype
        for row in arrays.fidx.rows() {
            assert_eq!(row, arrays.fidx.row(0));
        }
        // Rows are contiguous runs
        for row in arrays.idx1.rows() {
            for k in 1..row.len() {
                assert_eq!(row[k], row[k - 1] + 1);
            }
        }
    }

    #[test]
    fn test_fixed_margin_rejects_band_near_dc() {
        let indexer = FrequencyIndexer::new(grid(), 0.6, LeftBoundPolicy::FixedMargin);
        // Center bin 5, margin 6: window would start at bin -1
        let err = indexer.compute(&bands(vec![5.0], 10.0)).unwrap_err();
        assert_eq!(
            err,
            FilterBankError::Bounds {
                array: "idx1",
                index: -1,
                extent: 512
            }
        );
    }

    #[test]
    fn test_dc_aware_shifts_filter_with_window() {
        let indexer = FrequencyIndexer::new(grid(), 0.6, LeftBoundPolicy::DcAware);
        let arrays = indexer.compute(&bands(vec![5.0], 10.0)).unwrap();

        assert_eq!(arrays.idx1[[0, 0]], 0);
        // Bin 5 (the band center) still meets the DC coefficient
        let k = arrays.idx1.row(0).iter().position(|&v| v == 5).unwrap();
        assert_eq!(arrays.fidx[[0, k]], 512);
    }

    #[test]
    fn test_policies_agree_away_from_dc() {
        let set = bands(vec![50.0, 120.0, 300.0], 10.0);
        let fixed = FrequencyIndexer::new(grid(), 0.6, LeftBoundPolicy::FixedMargin)
            .compute(&set)
            .unwrap();
        let dc_aware = FrequencyIndexer::new(grid(), 0.6, LeftBoundPolicy::DcAware)
            .compute(&set)
            .unwrap();
        assert_eq!(fixed, dc_aware);
    }

    #[test]
    fn test_decimation_limits_bins() {
        let decimated = SampleGrid {
            decimate_by: 4,
            ..grid()
        };
        let indexer = FrequencyIndexer::new(decimated, 0.6, LeftBoundPolicy::FixedMargin);
        // Decimated Nyquist is 125 Hz; bins must stay below 128
        assert!(indexer.compute(&bands(vec![100.0], 10.0)).is_ok());
        assert!(matches!(
            indexer.compute(&bands(vec![124.0], 10.0)),
            Err(FilterBankError::Bounds { array: "idx1", .. })
        ));
    }

    #[test]
    fn test_too_narrow_band() {
        let indexer = FrequencyIndexer::new(grid(), 0.6, LeftBoundPolicy::FixedMargin);
        assert!(matches!(
            indexer.compute(&bands(vec![50.0], 0.2)),
            Err(FilterBankError::Configuration(_))
        ));
    }
}
