//! Window functions for STFT framing and prototype filter design

use crate::error::FilterBankError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/N)
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/N)
    #[default]
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/N) + 0.08*cos(4πn/N)
    Blackman,

    /// Rectangular window (no windowing)
    Rectangular,
}

impl WindowType {
    /// Lowercase name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
            WindowType::Blackman => "blackman",
            WindowType::Rectangular => "rectangular",
        }
    }

    /// Coefficient at phase `angle` = 2πn/N
    fn at(&self, angle: f64) -> f64 {
        match self {
            WindowType::Hann => 0.5 - 0.5 * angle.cos(),
            WindowType::Hamming => 0.54 - 0.46 * angle.cos(),
            WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
            WindowType::Rectangular => 1.0,
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowType {
    type Err = FilterBankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "blackman" => Ok(WindowType::Blackman),
            "rectangular" | "boxcar" | "rect" => Ok(WindowType::Rectangular),
            other => Err(FilterBankError::Configuration(format!(
                "unknown window '{}'",
                other
            ))),
        }
    }
}

/// Generate a symmetric window (for FIR design)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1, with w[0] == w[M-1]
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length == 1 {
        return vec![1.0];
    }
    let denom = (length - 1) as f64;
    (0..length)
        .map(|n| window_type.at(2.0 * PI * n as f64 / denom))
        .collect()
}

/// Generate a periodic (DFT-even) window (for STFT framing)
///
/// Same as the first `length` points of a symmetric window of `length + 1`.
pub fn generate_periodic_window(window_type: WindowType, length: usize) -> Vec<f64> {
    let denom = length as f64;
    (0..length)
        .map(|n| window_type.at(2.0 * PI * n as f64 / denom))
        .collect()
}
