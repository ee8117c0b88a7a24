//! Frequency bands of interest

use crate::config::BandSpec;
use crate::error::{FilterBankError, Result};
use serde::{Deserialize, Serialize};

/// Relative tolerance when checking that edge-defined bands share a width
const WIDTH_TOLERANCE: f64 = 1e-9;

/// A frequency interval to isolate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Center frequency (Hz)
    pub center: f64,

    /// Width (Hz)
    pub bandwidth: f64,
}

impl FrequencyBand {
    /// Lower edge (Hz)
    pub fn low(&self) -> f64 {
        self.center - self.bandwidth / 2.0
    }

    /// Upper edge (Hz)
    pub fn high(&self) -> f64 {
        self.center + self.bandwidth / 2.0
    }
}

/// Validated bands sharing one bandwidth
#[derive(Debug, Clone, PartialEq)]
pub struct BandSet {
    bands: Vec<FrequencyBand>,
    bandwidth: f64,
}

impl BandSet {
    /// Derive bands from a band spec
    ///
    /// Every band must have positive width and lie inside [0, nyquist]. All
    /// bands share the bandwidth of the single prototype filter.
    pub fn from_spec(spec: &BandSpec, nyquist: f64) -> Result<Self> {
        let bands: Vec<FrequencyBand> = match spec {
            BandSpec::Centers {
                center_freqs,
                bandwidth,
            } => center_freqs
                .iter()
                .map(|&center| FrequencyBand {
                    center,
                    bandwidth: *bandwidth,
                })
                .collect(),
            BandSpec::Edges(edges) => edges
                .iter()
                .map(|&[low, high]| FrequencyBand {
                    center: (low + high) / 2.0,
                    bandwidth: high - low,
                })
                .collect(),
        };

        let first = bands.first().ok_or_else(|| {
            FilterBankError::Configuration("at least one frequency band is required".into())
        })?;
        let bandwidth = first.bandwidth;

        for (i, band) in bands.iter().enumerate() {
            if !(band.center.is_finite() && band.bandwidth.is_finite()) {
                return Err(FilterBankError::Configuration(format!(
                    "band {} is not finite: {:?}",
                    i, band
                )));
            }
            if band.bandwidth <= 0.0 {
                return Err(FilterBankError::Configuration(format!(
                    "band {} has non-positive bandwidth {}",
                    i, band.bandwidth
                )));
            }
            if (band.bandwidth - bandwidth).abs() > bandwidth * WIDTH_TOLERANCE {
                return Err(FilterBankError::Configuration(format!(
                    "band {} has width {} Hz but the prototype filter is {} Hz wide",
                    i, band.bandwidth, bandwidth
                )));
            }
            if band.low() < 0.0 || band.high() > nyquist {
                return Err(FilterBankError::Configuration(format!(
                    "band {} [{}, {}] Hz lies outside [0, {}] Hz",
                    i,
                    band.low(),
                    band.high(),
                    nyquist
                )));
            }
        }

        Ok(Self { bands, bandwidth })
    }

    /// Bands in definition order
    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// Shared bandwidth (Hz)
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Center frequencies (Hz)
    pub fn center_freqs(&self) -> Vec<f64> {
        self.bands.iter().map(|b| b.center).collect()
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// True when there are no bands (never the case once validated)
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}
