//! STFT filter bank
//!
//! Splits multichannel signals into frequency bands:
//!
//! 1. STFT of the signal, scaled by `1 / decimate_by`
//! 2. band projection of every window, farmed out to the worker pool
//! 3. group-delay realignment of each segment (time domain)
//! 4. overlap-add into continuous per-band signals
//! 5. trimming of the STFT padding
//!
//! Everything that does not depend on the signal (bands, index arrays,
//! prototype filter, worker pool) is built once in [`FilterBank::new`].

use super::bands::BandSet;
use super::indexer::{FrequencyIndexer, IndexArrays, SampleGrid};
use super::projector::{BandpassProjector, ProjectorInputs};
use crate::config::{BinPlacement, Domain, FilterBankConfig, OutputKind, OVERLAP_FACTOR};
use crate::error::{FilterBankError, Result};
use crate::filters::{generate_periodic_window, PrototypeFilter, WindowType};
use crate::parallel::{DispatchShape, WorkDispatcher};
use crate::sample::BandSample;
use crate::spectrum::{overlap_add, StftEngine};
use log::{debug, info};
use ndarray::{s, Array2, Array3, Array4, ArrayView2, ArrayView4, ArrayViewMut4};
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

/// Result of [`FilterBank::analysis`]
#[derive(Debug, Clone, PartialEq)]
pub enum BankOutput {
    /// Real band signals `[channels, bands, samples]`
    Real(Array3<f64>),

    /// Analytic band signals `[channels, bands, samples]`
    Analytic(Array3<Complex64>),

    /// Band spectra per window `[channels, windows, bands, bins]`
    Spectra(Array4<Complex64>),
}

impl BankOutput {
    /// Shape of the contained array
    pub fn shape(&self) -> &[usize] {
        match self {
            BankOutput::Real(a) => a.shape(),
            BankOutput::Analytic(a) => a.shape(),
            BankOutput::Spectra(a) => a.shape(),
        }
    }

    pub fn as_real(&self) -> Option<&Array3<f64>> {
        match self {
            BankOutput::Real(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_analytic(&self) -> Option<&Array3<Complex64>> {
        match self {
            BankOutput::Analytic(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_spectra(&self) -> Option<&Array4<Complex64>> {
        match self {
            BankOutput::Spectra(a) => Some(a),
            _ => None,
        }
    }
}

/// Dispatcher specialised to the output sample type
enum Engine {
    Real(WorkDispatcher<f64>),
    Complex(WorkDispatcher<Complex64>),
}

impl Engine {
    fn shutdown(&mut self) {
        match self {
            Engine::Real(d) => d.shutdown(),
            Engine::Complex(d) => d.shutdown(),
        }
    }

    fn is_running(&self) -> bool {
        match self {
            Engine::Real(d) => d.is_running(),
            Engine::Complex(d) => d.is_running(),
        }
    }

    fn workers(&self) -> usize {
        match self {
            Engine::Real(d) => d.workers(),
            Engine::Complex(d) => d.workers(),
        }
    }
}

/// Time-domain reconstruction parameters, fixed at construction
#[derive(Debug, Clone, Copy)]
struct Reconstruction {
    /// Circular shift applied to each segment
    shift: usize,

    /// Output decimation factor
    decimate_by: usize,

    /// First kept sample of the overlap-added signal
    start: usize,

    /// Samples kept per band
    len: usize,
}

/// Multichannel STFT filter bank
pub struct FilterBank {
    config: FilterBankConfig,
    bands: BandSet,
    indices: IndexArrays,
    prototype: PrototypeFilter,
    stft: StftEngine,
    reconstruction: Reconstruction,
    engine: Engine,
}

impl FilterBank {
    /// Validate the configuration and build the bank
    ///
    /// All configuration and bounds errors are raised here, before any
    /// worker is spawned.
    pub fn new(config: FilterBankConfig) -> Result<Self> {
        config.validate()?;
        let bands = BandSet::from_spec(&config.bands, config.nyquist())?;

        let grid = SampleGrid {
            binsize: config.binsize,
            sample_rate: config.sample_rate,
            decimate_by: config.decimate_by,
        };
        let indices = FrequencyIndexer::new(grid, config.factor, config.left_bound).compute(&bands)?;

        let prototype = PrototypeFilter::design(
            config.order,
            bands.bandwidth() / 2.0,
            config.nyquist(),
            config.binsize,
        )?;

        let seg_len = config.decimated_binsize();
        let delay = prototype.delay();
        let shift = match config.domain {
            Domain::Time if config.delay_correction => delay / config.decimate_by,
            _ => 0,
        };

        let mut projector = BandpassProjector::new(
            prototype.response().clone(),
            bands.len(),
            seg_len,
            config.placement,
        )?;
        if shift > 0 {
            let phase = delay_phase(&indices, config.placement, config.binsize, delay, seg_len, shift);
            projector = projector.with_phase(phase)?;
        }
        let projector = Arc::new(projector);

        let stft = StftEngine::new(config.binsize, WindowType::default())?;
        let nwin = stft.num_frames(config.nsamp);
        let out_len = match config.domain {
            Domain::Time => projector.segment_len(),
            Domain::Freq => projector.spectrum_len(),
        };
        let shape = DispatchShape {
            spectra: (config.nch, nwin, stft.num_bins()),
            indices: indices.idx1.dim(),
            output: (config.nch, nwin, bands.len(), out_len),
        };
        let engine = spawn_engine(projector, &config, shape)?;

        let reconstruction = Reconstruction {
            shift,
            decimate_by: config.decimate_by,
            start: seg_len / 2,
            len: config.nsamp / config.decimate_by,
        };

        info!(
            "filter bank: {} bands of {} Hz, W={}, delay={} samples, {} worker(s), {:?} domain",
            bands.len(),
            bands.bandwidth(),
            indices.window_len(),
            delay,
            engine.workers(),
            config.domain
        );

        Ok(Self {
            config,
            bands,
            indices,
            prototype,
            stft,
            reconstruction,
            engine,
        })
    }

    /// Split `signal` (`[nch, nsamp]`) into bands
    ///
    /// # Returns
    /// - time domain: band signals `[nch, nfreqs, nsamp / decimate_by]`,
    ///   real or analytic per the configured output kind
    /// - freq domain: band spectra `[nch, nwin, nfreqs, binsize / decimate_by / 2]`
    pub fn analysis(&mut self, signal: ArrayView2<'_, f64>, window: WindowType) -> Result<BankOutput> {
        let expected = (self.config.nch, self.config.nsamp);
        if signal.dim() != expected {
            return Err(FilterBankError::ShapeMismatch {
                what: "signal",
                expected: vec![expected.0, expected.1],
                actual: vec![signal.nrows(), signal.ncols()],
            });
        }
        if !self.engine.is_running() {
            return Err(FilterBankError::ShutDown);
        }

        if self.stft.window_type() != window {
            debug!("switching analysis window to {}", window);
            self.stft = StftEngine::new(self.config.binsize, window)?;
        }
        let mut spectra = self.stft.process(signal)?;
        if self.config.decimate_by > 1 {
            let scale = 1.0 / self.config.decimate_by as f64;
            spectra.mapv_inplace(|v| v * scale);
        }

        let idx = &self.indices;
        let recon = self.reconstruction;
        let domain = self.config.domain;
        let binsize = self.config.binsize;

        match &mut self.engine {
            Engine::Real(dispatcher) => {
                let segments =
                    dispatcher.submit(spectra.view(), idx.idx1.view(), idx.idx2.view(), idx.fidx.view())?;
                let bands = reconstruct(segments, &recon, binsize, window)?;
                Ok(BankOutput::Real(bands))
            }
            Engine::Complex(dispatcher) => {
                let segments =
                    dispatcher.submit(spectra.view(), idx.idx1.view(), idx.idx2.view(), idx.fidx.view())?;
                match domain {
                    Domain::Freq => Ok(BankOutput::Spectra(segments.to_owned())),
                    Domain::Time => {
                        let bands = reconstruct(segments, &recon, binsize, window)?;
                        Ok(BankOutput::Analytic(bands))
                    }
                }
            }
        }
    }

    /// Stop the worker pool; the bank can no longer be used
    pub fn kill(&mut self) {
        self.engine.shutdown();
    }

    /// False once killed or after a fatal worker error
    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn config(&self) -> &FilterBankConfig {
        &self.config
    }

    pub fn bands(&self) -> &BandSet {
        &self.bands
    }

    pub fn indices(&self) -> &IndexArrays {
        &self.indices
    }

    pub fn prototype(&self) -> &PrototypeFilter {
        &self.prototype
    }

    /// Prototype group delay at the input rate
    pub fn delay(&self) -> usize {
        self.prototype.delay()
    }

    /// Prototype group delay at the output rate
    pub fn decimated_delay(&self) -> usize {
        self.prototype.delay() / self.config.decimate_by
    }

    /// STFT windows per analysed signal
    pub fn nwin(&self) -> usize {
        self.stft.num_frames(self.config.nsamp)
    }

    /// Bins gathered per band
    pub fn window_len(&self) -> usize {
        self.indices.window_len()
    }

    pub fn nfreqs(&self) -> usize {
        self.bands.len()
    }

    pub fn workers(&self) -> usize {
        self.engine.workers()
    }
}

fn spawn_engine(
    projector: Arc<BandpassProjector>,
    config: &FilterBankConfig,
    shape: DispatchShape,
) -> Result<Engine> {
    let workers = config.nprocs;
    let poll = config.poll;

    let engine = match (config.domain, config.output) {
        (Domain::Freq, OutputKind::Real) => Engine::Complex(WorkDispatcher::new(
            move |inputs: &ProjectorInputs<'_>, out: ArrayViewMut4<'_, Complex64>| {
                projector.project_spectra(inputs, out)
            },
            workers,
            shape,
            poll,
        )?),
        (Domain::Freq, OutputKind::Analytic) => Engine::Complex(WorkDispatcher::new(
            move |inputs: &ProjectorInputs<'_>, out: ArrayViewMut4<'_, Complex64>| {
                projector.project_analytic_spectra(inputs, out)
            },
            workers,
            shape,
            poll,
        )?),
        (Domain::Time, OutputKind::Real) => Engine::Real(WorkDispatcher::new(
            move |inputs: &ProjectorInputs<'_>, out: ArrayViewMut4<'_, f64>| {
                projector.project_real(inputs, out)
            },
            workers,
            shape,
            poll,
        )?),
        (Domain::Time, OutputKind::Analytic) => Engine::Complex(WorkDispatcher::new(
            move |inputs: &ProjectorInputs<'_>, out: ArrayViewMut4<'_, Complex64>| {
                projector.project_analytic(inputs, out)
            },
            workers,
            shape,
            poll,
        )?),
    };
    Ok(engine)
}

/// Phase factor per gathered bin that makes delay-corrected segments zero phase
///
/// The prototype's linear phase is measured from each band's centre bin
/// (`fidx - binsize/2`), while rotating a segment left by `shift` samples adds
/// a phase proportional to the bin's position in the segment. The factor
/// cancels what remains of both, so the carrier lines up with the input.
fn delay_phase(
    indices: &IndexArrays,
    placement: BinPlacement,
    binsize: usize,
    delay: usize,
    seg_len: usize,
    shift: usize,
) -> Array2<Complex64> {
    let dc = (binsize / 2) as f64;
    Array2::from_shape_fn(indices.idx1.dim(), |(b, k)| {
        let dest = match placement {
            BinPlacement::Spectral => indices.idx1[[b, k]],
            BinPlacement::Baseband => k,
        };
        let offset = indices.fidx[[b, k]] as f64 - dc;
        let cycles = dest as f64 * shift as f64 / seg_len as f64 - offset * delay as f64 / binsize as f64;
        Complex64::from_polar(1.0, -2.0 * PI * cycles)
    })
}

/// Delay-correct, overlap-add and trim projected segments
fn reconstruct<T: BandSample>(
    segments: ArrayView4<'_, T>,
    recon: &Reconstruction,
    binsize: usize,
    window: WindowType,
) -> Result<Array3<T>> {
    let seg_len = segments.dim().3;

    // Rotate left: segment[k] <- segment[(k + shift) % len]
    let shift = recon.shift % seg_len.max(1);
    let aligned = if shift == 0 {
        segments.to_owned()
    } else {
        Array4::from_shape_fn(segments.dim(), |(c, t, b, k)| {
            segments[[c, t, b, (k + shift) % seg_len]]
        })
    };

    // Analysis window sampled at the output rate
    let full = generate_periodic_window(window, binsize);
    let decimated: Vec<f64> = full.iter().step_by(recon.decimate_by).copied().collect();

    let joined = overlap_add(aligned.view(), &decimated, OVERLAP_FACTOR)?;
    let end = recon.start + recon.len;
    if joined.dim().2 < end {
        return Err(FilterBankError::ShapeMismatch {
            what: "overlap-add output",
            expected: vec![joined.dim().0, joined.dim().1, end],
            actual: vec![joined.dim().0, joined.dim().1, joined.dim().2],
        });
    }
    Ok(joined.slice(s![.., .., recon.start..end]).to_owned())
}
