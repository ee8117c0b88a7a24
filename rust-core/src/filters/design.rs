//! FIR lowpass design using the windowing method
//!
//! Also provides the group-delay estimate used to realign filtered output.

use super::windows::{generate_window, WindowType};
use crate::error::{FilterBankError, Result};
use rustfft::{num_complex::Complex64, FftPlanner};
use std::f64::consts::PI;

/// Relative magnitude below which a bin is treated as a zero of H
const SINGULAR_TOLERANCE: f64 = 1e-9;

/// Design a lowpass FIR filter
///
/// # Arguments
/// * `order` - Filter order; the filter has `order + 1` taps
/// * `cutoff_hz` - Cutoff frequency in Hz
/// * `nyquist_hz` - Nyquist frequency in Hz
/// * `window_type` - Window applied to the ideal (sinc) response
///
/// # Returns
/// Coefficients h[n] normalized to unit DC gain
pub fn design_lowpass_fir(
    order: usize,
    cutoff_hz: f64,
    nyquist_hz: f64,
    window_type: WindowType,
) -> Result<Vec<f64>> {
    if order == 0 {
        return Err(FilterBankError::Configuration(
            "filter order must be at least 1".into(),
        ));
    }
    if !(cutoff_hz > 0.0 && cutoff_hz < nyquist_hz) {
        return Err(FilterBankError::Configuration(format!(
            "cutoff {} Hz must lie in (0, {}) Hz",
            cutoff_hz, nyquist_hz
        )));
    }

    let m = order + 1;
    let window = generate_window(window_type, m);
    let wc_rad = cutoff_hz / nyquist_hz * PI;
    let center = order as f64 / 2.0;

    let mut h: Vec<f64> = (0..m)
        .map(|n| {
            let n_shifted = n as f64 - center;
            let h_ideal = if n_shifted.abs() < 1e-10 {
                wc_rad / PI
            } else {
                (wc_rad * n_shifted).sin() / (PI * n_shifted)
            };
            h_ideal * window[n]
        })
        .collect();

    // Unit gain at DC
    let dc: f64 = h.iter().sum();
    if dc.abs() > f64::EPSILON {
        h.iter_mut().for_each(|c| *c /= dc);
    }

    Ok(h)
}

/// Group delay of an FIR filter in samples at `n_points` frequencies in [0, π)
///
/// Uses gd(ω) = Re{ DFT(n·h) / DFT(h) }. Frequencies where |H| vanishes have
/// no defined group delay and are returned as `None`.
pub fn group_delay(h: &[f64], n_points: usize) -> Vec<Option<f64>> {
    let nfft = (2 * n_points).max(h.len().next_power_of_two());
    let fft = FftPlanner::<f64>::new().plan_fft_forward(nfft);

    let mut b = vec![Complex64::new(0.0, 0.0); nfft];
    let mut c = vec![Complex64::new(0.0, 0.0); nfft];
    for (n, &coeff) in h.iter().enumerate() {
        b[n] = Complex64::new(coeff, 0.0);
        c[n] = Complex64::new(coeff * n as f64, 0.0);
    }
    fft.process(&mut b);
    fft.process(&mut c);

    let peak = b.iter().map(|v| v.norm()).fold(0.0, f64::max);
    let step = nfft / (2 * n_points);

    (0..n_points)
        .map(|k| {
            let bin = k * step;
            if b[bin].norm() <= peak * SINGULAR_TOLERANCE {
                None
            } else {
                Some((c[bin] / b[bin]).re)
            }
        })
        .collect()
}

/// Mean group delay over [0, π), rounded to whole samples
pub fn mean_group_delay(h: &[f64]) -> usize {
    let delays: Vec<f64> = group_delay(h, 512).into_iter().flatten().collect();
    if delays.is_empty() {
        return 0;
    }
    let mean = delays.iter().sum::<f64>() / delays.len() as f64;
    mean.round().max(0.0) as usize
}
