//! Band projection of STFT frames
//!
//! For every (channel, window) the projector performs one gather-multiply-
//! scatter over the index arrays:
//!
//! ```text
//! bands[idx2[b,k], dest(b,k)] = X[idx1[b,k]] * filter[fidx[b,k]]
//! ```
//!
//! which selects each band and applies the frequency-shifted prototype, then
//! (in the time domain) inverts every band spectrum to a segment of
//! `binsize / decimate_by` samples.
//!
//! The projector holds only immutable data, so calling it from the caller's
//! thread or from a worker on a slice of windows gives identical results.

use crate::config::BinPlacement;
use crate::error::{FilterBankError, Result};
use ndarray::{s, Array1, Array2, ArrayView2, ArrayView3, ArrayViewMut4};
use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Borrowed inputs of one projection call
#[derive(Debug, Clone, Copy)]
pub struct ProjectorInputs<'a> {
    /// STFT bins `[channels, windows, bins]`
    pub spectra: ArrayView3<'a, Complex64>,
    pub idx1: ArrayView2<'a, usize>,
    pub idx2: ArrayView2<'a, usize>,
    pub fidx: ArrayView2<'a, usize>,
}

impl<'a> ProjectorInputs<'a> {
    /// Restrict to a range of windows
    pub fn windows(&self, range: std::ops::Range<usize>) -> ProjectorInputs<'a> {
        ProjectorInputs {
            spectra: self.spectra.slice_move(s![.., range, ..]),
            ..*self
        }
    }
}

/// Gather-multiply-scatter plus per-band inverse FFT
pub struct BandpassProjector {
    /// Prototype response, DC at the middle
    filter: Array1<Complex64>,

    /// Number of bands
    nfreqs: usize,

    /// Time-domain segment length (decimated bin size)
    seg_len: usize,

    /// Scatter destination policy
    placement: BinPlacement,

    /// Per-(band, bin) phase factor, same shape as the index arrays
    phase: Option<Array2<Complex64>>,

    /// Inverse real FFT (real output)
    c2r: Arc<dyn ComplexToReal<f64>>,

    /// Inverse complex FFT (analytic output)
    c2c: Arc<dyn Fft<f64>>,
}

impl BandpassProjector {
    /// Create new projector
    ///
    /// # Arguments
    /// * `filter` - DC-centered prototype response
    /// * `nfreqs` - Number of bands
    /// * `seg_len` - Output segment length; must be even
    /// * `placement` - Where gathered bins land
    pub fn new(
        filter: Array1<Complex64>,
        nfreqs: usize,
        seg_len: usize,
        placement: BinPlacement,
    ) -> Result<Self> {
        if seg_len < 2 || seg_len % 2 != 0 {
            return Err(FilterBankError::Configuration(format!(
                "segment length must be even and >= 2, got {}",
                seg_len
            )));
        }
        let c2r = RealFftPlanner::<f64>::new().plan_fft_inverse(seg_len);
        let c2c = FftPlanner::<f64>::new().plan_fft_inverse(seg_len);
        Ok(Self {
            filter,
            nfreqs,
            seg_len,
            placement,
            phase: None,
            c2r,
            c2c,
        })
    }

    /// Multiply every gathered bin by `phase[b, k]`
    ///
    /// Used to cancel the linear phase that remains after the filter's group
    /// delay is removed by rotating the time segments.
    pub fn with_phase(mut self, phase: Array2<Complex64>) -> Result<Self> {
        if phase.nrows() != self.nfreqs {
            return Err(FilterBankError::ShapeMismatch {
                what: "phase",
                expected: vec![self.nfreqs, phase.ncols()],
                actual: vec![phase.nrows(), phase.ncols()],
            });
        }
        self.phase = Some(phase);
        Ok(self)
    }

    /// Number of bands
    pub fn nfreqs(&self) -> usize {
        self.nfreqs
    }

    /// Time-domain segment length
    pub fn segment_len(&self) -> usize {
        self.seg_len
    }

    /// Bins per band spectrum in frequency-domain output
    pub fn spectrum_len(&self) -> usize {
        self.seg_len / 2
    }

    /// Band spectra, `out` shaped `[channels, windows, nfreqs, seg_len/2]`
    pub fn project_spectra(
        &self,
        inputs: &ProjectorInputs<'_>,
        out: ArrayViewMut4<'_, Complex64>,
    ) -> Result<()> {
        self.spectra_into(inputs, out, false)
    }

    /// One-sided spectra of the analytic band signals: as `project_spectra`
    /// with every non-DC bin doubled
    pub fn project_analytic_spectra(
        &self,
        inputs: &ProjectorInputs<'_>,
        out: ArrayViewMut4<'_, Complex64>,
    ) -> Result<()> {
        self.spectra_into(inputs, out, true)
    }

    fn spectra_into(
        &self,
        inputs: &ProjectorInputs<'_>,
        mut out: ArrayViewMut4<'_, Complex64>,
        analytic: bool,
    ) -> Result<()> {
        self.check(inputs, out.dim(), self.spectrum_len())?;
        let (nch, nwin, _) = inputs.spectra.dim();
        let half = self.spectrum_len();
        let mut bands = self.band_buffer();

        for ch in 0..nch {
            for t in 0..nwin {
                self.gather(inputs, ch, t, &mut bands);
                let mut dst = out.slice_mut(s![ch, t, .., ..]);
                dst.assign(&bands.slice(s![.., ..half]));
                if analytic {
                    dst.slice_mut(s![.., 1..]).mapv_inplace(|v| v * 2.0);
                }
            }
        }
        Ok(())
    }

    /// Real band segments, `out` shaped `[channels, windows, nfreqs, seg_len]`
    pub fn project_real(
        &self,
        inputs: &ProjectorInputs<'_>,
        mut out: ArrayViewMut4<'_, f64>,
    ) -> Result<()> {
        self.check(inputs, out.dim(), self.seg_len)?;
        let (nch, nwin, _) = inputs.spectra.dim();
        let mut bands = self.band_buffer();
        let mut spectrum = self.c2r.make_input_vec();
        let mut segment = self.c2r.make_output_vec();
        let mut scratch = self.c2r.make_scratch_vec();
        let scale = 1.0 / self.seg_len as f64;

        for ch in 0..nch {
            for t in 0..nwin {
                self.gather(inputs, ch, t, &mut bands);
                for (b, row) in bands.outer_iter().enumerate() {
                    for (dst, &src) in spectrum.iter_mut().zip(row.iter()) {
                        *dst = src;
                    }
                    // DC and Nyquist of a real signal carry no imaginary part
                    spectrum[0].im = 0.0;
                    if let Some(last) = spectrum.last_mut() {
                        last.im = 0.0;
                    }
                    self.c2r
                        .process_with_scratch(&mut spectrum, &mut segment, &mut scratch)?;
                    for (dst, &v) in out.slice_mut(s![ch, t, b, ..]).iter_mut().zip(&segment) {
                        *dst = v * scale;
                    }
                }
            }
        }
        Ok(())
    }

    /// Analytic band segments, `out` shaped `[channels, windows, nfreqs, seg_len]`
    ///
    /// Non-DC bins are doubled and the negative-frequency half left empty, so
    /// the inverse transform yields the analytic signal of each band.
    pub fn project_analytic(
        &self,
        inputs: &ProjectorInputs<'_>,
        mut out: ArrayViewMut4<'_, Complex64>,
    ) -> Result<()> {
        self.check(inputs, out.dim(), self.seg_len)?;
        let (nch, nwin, _) = inputs.spectra.dim();
        let half = self.spectrum_len();
        let mut bands = self.band_buffer();
        let mut buffer = vec![Complex64::default(); self.seg_len];
        let mut scratch = vec![Complex64::default(); self.c2c.get_inplace_scratch_len()];
        let scale = 1.0 / self.seg_len as f64;

        for ch in 0..nch {
            for t in 0..nwin {
                self.gather(inputs, ch, t, &mut bands);
                for (b, row) in bands.outer_iter().enumerate() {
                    buffer.fill(Complex64::default());
                    for (k, (dst, &src)) in buffer[..half].iter_mut().zip(row.iter()).enumerate() {
                        *dst = if k == 0 { src } else { src * 2.0 };
                    }
                    self.c2c.process_with_scratch(&mut buffer, &mut scratch);
                    for (dst, &v) in out.slice_mut(s![ch, t, b, ..]).iter_mut().zip(&buffer) {
                        *dst = v * scale;
                    }
                }
            }
        }
        Ok(())
    }

    /// Zeroed `[nfreqs, seg_len/2 + 1]` work buffer
    fn band_buffer(&self) -> Array2<Complex64> {
        Array2::zeros((self.nfreqs, self.spectrum_len() + 1))
    }

    /// The gather-multiply-scatter for one (channel, window)
    fn gather(&self, inputs: &ProjectorInputs<'_>, ch: usize, t: usize, bands: &mut Array2<Complex64>) {
        bands.fill(Complex64::default());
        let x = inputs.spectra.slice(s![ch, t, ..]);
        for ((b, k), &bin) in inputs.idx1.indexed_iter() {
            let dest = match self.placement {
                BinPlacement::Spectral => bin,
                BinPlacement::Baseband => k,
            };
            let mut v = x[bin] * self.filter[inputs.fidx[[b, k]]];
            if let Some(phase) = &self.phase {
                v *= phase[[b, k]];
            }
            bands[[inputs.idx2[[b, k]], dest]] = v;
        }
    }

    /// Validate shapes and index extents before touching any element
    fn check(
        &self,
        inputs: &ProjectorInputs<'_>,
        out_dim: (usize, usize, usize, usize),
        out_len: usize,
    ) -> Result<()> {
        let (nch, nwin, nbins) = inputs.spectra.dim();
        let expected = (nch, nwin, self.nfreqs, out_len);
        if out_dim != expected {
            return Err(FilterBankError::ShapeMismatch {
                what: "projector output",
                expected: vec![expected.0, expected.1, expected.2, expected.3],
                actual: vec![out_dim.0, out_dim.1, out_dim.2, out_dim.3],
            });
        }

        let index_dim = inputs.idx1.dim();
        for (what, dim) in [("idx2", inputs.idx2.dim()), ("fidx", inputs.fidx.dim())] {
            if dim != index_dim {
                return Err(FilterBankError::ShapeMismatch {
                    what,
                    expected: vec![index_dim.0, index_dim.1],
                    actual: vec![dim.0, dim.1],
                });
            }
        }

        if let Some(phase) = &self.phase {
            if phase.dim() != index_dim {
                return Err(FilterBankError::ShapeMismatch {
                    what: "phase",
                    expected: vec![index_dim.0, index_dim.1],
                    actual: vec![phase.nrows(), phase.ncols()],
                });
            }
        }

        let half = self.spectrum_len();
        let bin_limit = nbins.min(half);
        let dest_limit = match self.placement {
            BinPlacement::Spectral => bin_limit,
            BinPlacement::Baseband => half,
        };
        if index_dim.1 > dest_limit {
            return Err(FilterBankError::Bounds {
                array: "idx1",
                index: index_dim.1 as i64 - 1,
                extent: dest_limit,
            });
        }
        bounded("idx1", inputs.idx1, bin_limit)?;
        bounded("idx2", inputs.idx2, self.nfreqs)?;
        bounded("fidx", inputs.fidx, self.filter.len())
    }
}

fn bounded(array: &'static str, values: ArrayView2<'_, usize>, extent: usize) -> Result<()> {
    match values.iter().find(|&&v| v >= extent) {
        Some(&v) => Err(FilterBankError::Bounds {
            array,
            index: v as i64,
            extent,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    /// Flat unit filter so projections expose the raw gathered bins
    fn flat_projector(nfreqs: usize, seg_len: usize, placement: BinPlacement) -> BandpassProjector {
        let filter = Array1::from_elem(64, Complex64::new(1.0, 0.0));
        BandpassProjector::new(filter, nfreqs, seg_len, placement).unwrap()
    }

    fn indices(rows: &[Vec<usize>]) -> (Array2<usize>, Array2<usize>, Array2<usize>) {
        let w = rows[0].len();
        let idx1 = Array2::from_shape_fn((rows.len(), w), |(b, k)| rows[b][k]);
        let idx2 = Array2::from_shape_fn((rows.len(), w), |(b, _)| b);
        let fidx = Array2::from_shape_fn((rows.len(), w), |(_, k)| 30 + k);
        (idx1, idx2, fidx)
    }

    #[test]
    fn test_spectral_placement_keeps_bin_positions() {
        let projector = flat_projector(2, 32, BinPlacement::Spectral);
        let x = Array3::from_shape_fn((1, 2, 17), |(_, t, k)| Complex64::new(k as f64, t as f64));
        let (idx1, idx2, fidx) = indices(&[vec![2, 3, 4], vec![9, 10, 11]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut out = Array4::zeros((1, 2, 2, 16));
        projector.project_spectra(&inputs, out.view_mut()).unwrap();

        assert_eq!(out[[0, 1, 0, 3]], Complex64::new(3.0, 1.0));
        assert_eq!(out[[0, 1, 1, 10]], Complex64::new(10.0, 1.0));
        // Outside the band window nothing is kept
        assert_eq!(out[[0, 1, 0, 9]], Complex64::default());
        assert_eq!(out[[0, 0, 1, 3]], Complex64::default());
    }

    #[test]
    fn test_baseband_placement_packs_bins() {
        let projector = flat_projector(1, 32, BinPlacement::Baseband);
        let x = Array3::from_shape_fn((1, 1, 17), |(_, _, k)| Complex64::new(k as f64, 0.0));
        let (idx1, idx2, fidx) = indices(&[vec![9, 10, 11]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut out = Array4::zeros((1, 1, 1, 16));
        projector.project_spectra(&inputs, out.view_mut()).unwrap();
        let row: Vec<f64> = out.slice(s![0, 0, 0, ..4]).iter().map(|c| c.re).collect();
        assert_eq!(row, vec![9.0, 10.0, 11.0, 0.0]);
    }

    #[test]
    fn test_real_projection_recovers_cosine() {
        // A single bin k of amplitude N/2 inverts to cos(2πkn/N)
        let n = 32;
        let k = 4;
        let projector = flat_projector(1, n, BinPlacement::Spectral);
        let mut x = Array3::zeros((1, 1, n / 2 + 1));
        x[[0, 0, k]] = Complex64::new(n as f64 / 2.0, 0.0);
        let (idx1, idx2, fidx) = indices(&[vec![3, 4, 5]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut out = Array4::zeros((1, 1, 1, n));
        projector.project_real(&inputs, out.view_mut()).unwrap();
        for t in 0..n {
            let expected = (2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64).cos();
            assert!((out[[0, 0, 0, t]] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_analytic_projection_has_constant_envelope() {
        let n = 32;
        let k = 4;
        let projector = flat_projector(1, n, BinPlacement::Spectral);
        let mut x = Array3::zeros((1, 1, n / 2 + 1));
        x[[0, 0, k]] = Complex64::new(n as f64 / 2.0, 0.0);
        let (idx1, idx2, fidx) = indices(&[vec![3, 4, 5]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut out = Array4::zeros((1, 1, 1, n));
        projector.project_analytic(&inputs, out.view_mut()).unwrap();
        for t in 0..n {
            let phase = 2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64;
            let v = out[[0, 0, 0, t]];
            assert!((v.re - phase.cos()).abs() < 1e-12);
            assert!((v.im - phase.sin()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_filter_coefficients_scale_bins() {
        let mut filter = Array1::from_elem(64, Complex64::new(1.0, 0.0));
        filter[31] = Complex64::new(0.0, 2.0);
        let projector = BandpassProjector::new(filter, 1, 32, BinPlacement::Spectral).unwrap();
        let x = Array3::from_elem((1, 1, 17), Complex64::new(1.0, 0.0));
        let (idx1, idx2, fidx) = indices(&[vec![3, 4, 5]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut out = Array4::zeros((1, 1, 1, 16));
        projector.project_spectra(&inputs, out.view_mut()).unwrap();
        assert_eq!(out[[0, 0, 0, 4]], Complex64::new(0.0, 2.0));
        assert_eq!(out[[0, 0, 0, 3]], Complex64::new(1.0, 0.0));
    }

    #[test]
    fn test_phase_factor_applied_per_bin() {
        let phase = Array2::from_shape_fn((1, 3), |(_, k)| Complex64::new(0.0, 1.0 + k as f64));
        let projector = flat_projector(1, 32, BinPlacement::Spectral).with_phase(phase).unwrap();
        let x = Array3::from_elem((1, 1, 17), Complex64::new(2.0, 0.0));
        let (idx1, idx2, fidx) = indices(&[vec![3, 4, 5]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut out = Array4::zeros((1, 1, 1, 16));
        projector.project_spectra(&inputs, out.view_mut()).unwrap();
        assert_eq!(out[[0, 0, 0, 3]], Complex64::new(0.0, 2.0));
        assert_eq!(out[[0, 0, 0, 5]], Complex64::new(0.0, 6.0));
    }

    #[test]
    fn test_phase_shape_must_match_indices() {
        let phase = Array2::from_elem((1, 2), Complex64::new(1.0, 0.0));
        let projector = flat_projector(1, 32, BinPlacement::Spectral).with_phase(phase).unwrap();
        let x = Array3::zeros((1, 1, 17));
        let (idx1, idx2, fidx) = indices(&[vec![3, 4, 5]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };
        let mut out = Array4::zeros((1, 1, 1, 16));
        assert!(matches!(
            projector.project_spectra(&inputs, out.view_mut()),
            Err(FilterBankError::ShapeMismatch { what: "phase", .. })
        ));
        assert!(flat_projector(2, 32, BinPlacement::Spectral)
            .with_phase(Array2::zeros((1, 3)))
            .is_err());
    }

    #[test]
    fn test_analytic_spectra_double_non_dc_bins() {
        let projector = flat_projector(1, 32, BinPlacement::Spectral);
        let x = Array3::from_shape_fn((1, 2, 17), |(_, t, k)| Complex64::new(k as f64, t as f64));
        let (idx1, idx2, fidx) = indices(&[vec![0, 1, 2, 3]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut plain = Array4::zeros((1, 2, 1, 16));
        let mut analytic = Array4::zeros((1, 2, 1, 16));
        projector.project_spectra(&inputs, plain.view_mut()).unwrap();
        projector.project_analytic_spectra(&inputs, analytic.view_mut()).unwrap();

        assert_eq!(analytic[[0, 1, 0, 0]], plain[[0, 1, 0, 0]]);
        for k in 1..16 {
            assert_eq!(analytic[[0, 1, 0, k]], plain[[0, 1, 0, k]] * 2.0);
        }
        assert_eq!(analytic[[0, 1, 0, 2]], Complex64::new(4.0, 2.0));
    }

    #[test]
    fn test_rejects_out_of_range_indices() {
        let projector = flat_projector(1, 32, BinPlacement::Spectral);
        let x = Array3::zeros((1, 1, 17));
        let (idx1, idx2, fidx) = indices(&[vec![15, 16, 17]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };
        let mut out = Array4::zeros((1, 1, 1, 16));
        assert!(matches!(
            projector.project_spectra(&inputs, out.view_mut()),
            Err(FilterBankError::Bounds { array: "idx1", index: 16, extent: 16 })
        ));
    }

    #[test]
    fn test_rejects_wrong_output_shape() {
        let projector = flat_projector(2, 32, BinPlacement::Spectral);
        let x = Array3::zeros((1, 1, 17));
        let (idx1, idx2, fidx) = indices(&[vec![1, 2], vec![3, 4]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };
        let mut out = Array4::zeros((1, 1, 2, 16));
        assert!(matches!(
            projector.project_real(&inputs, out.view_mut()),
            Err(FilterBankError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_window_slice_matches_full_call() {
        let projector = flat_projector(1, 32, BinPlacement::Spectral);
        let x = Array3::from_shape_fn((2, 5, 17), |(c, t, k)| {
            Complex64::new((c * 7 + t * 3 + k) as f64, k as f64 * 0.5)
        });
        let (idx1, idx2, fidx) = indices(&[vec![3, 4, 5, 6]]);
        let inputs = ProjectorInputs {
            spectra: x.view(),
            idx1: idx1.view(),
            idx2: idx2.view(),
            fidx: fidx.view(),
        };

        let mut full = Array4::zeros((2, 5, 1, 32));
        projector.project_real(&inputs, full.view_mut()).unwrap();

        let mut part = Array4::zeros((2, 2, 1, 32));
        projector.project_real(&inputs.windows(2..4), part.view_mut()).unwrap();
        assert_eq!(part, full.slice(s![.., 2..4, .., ..]));
    }
}
