//! Element types flowing through the filter bank

use num_complex::Complex64;
use std::ops::{AddAssign, Mul};

/// Sample type of filtered output: `f64` for real output, `Complex64` for
/// analytic output and band spectra.
pub trait BandSample:
    Copy + Default + Send + Sync + AddAssign + Mul<f64, Output = Self> + 'static
{
}

impl BandSample for f64 {}

impl BandSample for Complex64 {}
