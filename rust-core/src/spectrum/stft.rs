//! Short-time Fourier transform using realfft
//!
//! Frames are centred: the signal is zero-padded by half a window on each
//! side and hopped by half a window, so frame `t` is centred on sample
//! `t * binsize / 2`.

use crate::error::{FilterBankError, Result};
use crate::filters::windows::{generate_periodic_window, WindowType};
use ndarray::{Array3, ArrayView2};
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// STFT engine for real-valued multichannel signals
pub struct StftEngine {
    /// Window size (samples)
    binsize: usize,

    /// Window applied to each frame
    window_type: WindowType,
    window: Vec<f64>,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable buffers
    frame: Vec<f64>,
    spectrum: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl StftEngine {
    /// Create new STFT engine
    ///
    /// # Arguments
    /// * `binsize` - Window size; must be even
    /// * `window_type` - Analysis window
    pub fn new(binsize: usize, window_type: WindowType) -> Result<Self> {
        if binsize < 2 || binsize % 2 != 0 {
            return Err(FilterBankError::Configuration(format!(
                "STFT binsize must be even and >= 2, got {}",
                binsize
            )));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(binsize);
        let spectrum = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Ok(Self {
            binsize,
            window_type,
            window: generate_periodic_window(window_type, binsize),
            r2c,
            frame: vec![0.0; binsize],
            spectrum,
            scratch,
        })
    }

    /// Hop between frames
    pub fn hop(&self) -> usize {
        self.binsize / 2
    }

    /// Number of bins per frame (binsize/2 + 1)
    pub fn num_bins(&self) -> usize {
        self.binsize / 2 + 1
    }

    /// Number of frames produced for `nsamp` samples
    pub fn num_frames(&self, nsamp: usize) -> usize {
        nsamp / self.hop() + 1
    }

    /// Analysis window type
    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// Frequency in Hz of STFT bin `bin`
    pub fn bin_to_hz(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.binsize as f64
    }

    /// Compute the one-sided STFT
    ///
    /// # Arguments
    /// * `signal` - Signal shaped `[channels, samples]`
    ///
    /// # Returns
    /// Spectra shaped `[channels, frames, binsize/2 + 1]`
    pub fn process(&mut self, signal: ArrayView2<'_, f64>) -> Result<Array3<Complex64>> {
        let (nch, nsamp) = signal.dim();
        let nwin = self.num_frames(nsamp);
        let half = self.binsize / 2;
        let mut out = Array3::zeros((nch, nwin, self.num_bins()));

        for (ch, row) in signal.outer_iter().enumerate() {
            for t in 0..nwin {
                // Frame start in padded coordinates is t*hop; shift back by half a window
                let start = (t * self.hop()) as isize - half as isize;
                for (k, dst) in self.frame.iter_mut().enumerate() {
                    let n = start + k as isize;
                    *dst = if n >= 0 && (n as usize) < nsamp {
                        row[n as usize] * self.window[k]
                    } else {
                        0.0
                    };
                }

                self.r2c.process_with_scratch(
                    &mut self.frame,
                    &mut self.spectrum,
                    &mut self.scratch,
                )?;

                for (dst, &src) in out
                    .slice_mut(ndarray::s![ch, t, ..])
                    .iter_mut()
                    .zip(self.spectrum.iter())
                {
                    *dst = src;
                }
            }
        }

        Ok(out)
    }
}

/// One-shot STFT
pub fn stft(
    signal: ArrayView2<'_, f64>,
    binsize: usize,
    window_type: WindowType,
) -> Result<Array3<Complex64>> {
    StftEngine::new(binsize, window_type)?.process(signal)
}
