//! Prototype lowpass filter shared by every band
//!
//! One lowpass response is designed once and reused for all bands by
//! frequency-shifted application, rather than designing a bandpass per band.

use super::design::{design_lowpass_fir, mean_group_delay};
use super::windows::WindowType;
use crate::error::{FilterBankError, Result};
use ndarray::Array1;
use rustfft::{num_complex::Complex64, FftPlanner};

/// Lowpass prototype with its DC-centered frequency response
#[derive(Debug, Clone)]
pub struct PrototypeFilter {
    /// Impulse response, `order + 1` taps
    impulse: Vec<f64>,

    /// Frequency response over `n_taps` bins, DC at index `n_taps / 2`
    response: Array1<Complex64>,

    /// Mean group delay in samples
    delay: usize,
}

impl PrototypeFilter {
    /// Design the prototype
    ///
    /// # Arguments
    /// * `order` - Filter order
    /// * `cutoff_hz` - Cutoff (half the band bandwidth)
    /// * `nyquist_hz` - Half the sample rate
    /// * `n_taps` - Length of the frequency response (the STFT bin size)
    pub fn design(order: usize, cutoff_hz: f64, nyquist_hz: f64, n_taps: usize) -> Result<Self> {
        if order + 1 > n_taps {
            return Err(FilterBankError::Configuration(format!(
                "filter of {} taps does not fit a response of {} bins",
                order + 1,
                n_taps
            )));
        }

        let impulse = design_lowpass_fir(order, cutoff_hz, nyquist_hz, WindowType::Hamming)?;
        let response = shifted_response(&impulse, n_taps);
        let delay = mean_group_delay(&impulse);

        Ok(Self {
            impulse,
            response,
            delay,
        })
    }

    /// Impulse response
    pub fn impulse(&self) -> &[f64] {
        &self.impulse
    }

    /// DC-centered frequency response
    pub fn response(&self) -> &Array1<Complex64> {
        &self.response
    }

    /// Processing delay in samples
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Number of response bins
    pub fn n_taps(&self) -> usize {
        self.response.len()
    }
}

/// Zero-pad to `n_taps`, transform, and rotate DC to the middle
fn shifted_response(impulse: &[f64], n_taps: usize) -> Array1<Complex64> {
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n_taps);
    let mut buffer = vec![Complex64::new(0.0, 0.0); n_taps];
    for (dst, &h) in buffer.iter_mut().zip(impulse) {
        *dst = Complex64::new(h, 0.0);
    }
    fft.process(&mut buffer);
    buffer.rotate_right(n_taps / 2);
    Array1::from(buffer)
}
