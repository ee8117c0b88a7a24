//! Configuration for the filter bank
//!
//! One immutable value, validated once at construction and shared by
//! reference with every component that needs it.

use crate::error::{FilterBankError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Safety margin applied to the bandwidth when sizing band windows
pub const DEFAULT_FACTOR: f64 = 0.6;

/// STFT frames overlap by half a bin
pub const OVERLAP_FACTOR: f64 = 0.5;

/// Domain of the filtered output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Continuous per-band time series
    #[default]
    Time,
    /// Per-window band spectra, no reconstruction
    Freq,
}

/// Kind of time-domain output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Real band-limited signal
    #[default]
    Real,
    /// Analytic signal (real part plus Hilbert transform)
    Analytic,
}

/// How the left edge of a band window is placed
///
/// The two variants only differ for bands whose window would start below DC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeftBoundPolicy {
    /// Window always starts `margin` bins left of the band center.
    /// Bands too close to DC are rejected with a bounds error.
    #[default]
    FixedMargin,
    /// Window is clamped into the valid bin range and the filter window is
    /// shifted by the same amount, keeping bin/coefficient alignment.
    DcAware,
}

/// Where gathered bins land in the per-band spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinPlacement {
    /// Bins keep their own frequency; output oscillates at the band frequency
    #[default]
    Spectral,
    /// Bins are packed at the start of the segment spectrum (demodulated)
    Baseband,
}

/// Band definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSpec {
    /// Center frequencies in Hz sharing one bandwidth
    Centers {
        center_freqs: Vec<f64>,
        bandwidth: f64,
    },
    /// Explicit `[low, high]` edges in Hz; all bands must have equal width
    Edges(Vec<[f64; 2]>),
}

impl Default for BandSpec {
    fn default() -> Self {
        BandSpec::Centers {
            center_freqs: Vec::new(),
            bandwidth: 0.0,
        }
    }
}

/// Polling behaviour of the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Sleep between checks while the caller waits for an epoch
    pub submit_interval: Duration,

    /// Sleep between checks while a worker waits for new work
    pub worker_interval: Duration,

    /// Busy-spin iterations before falling back to sleeping
    pub spin_iterations: u32,

    /// Longest the caller waits for one epoch (`None` waits forever)
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            submit_interval: Duration::from_millis(10),
            worker_interval: Duration::from_millis(1),
            spin_iterations: 256,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Filter bank configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterBankConfig {
    /// Number of channels
    pub nch: usize,

    /// Samples per channel in each analysed signal
    pub nsamp: usize,

    /// STFT window size (samples)
    pub binsize: usize,

    /// Decimation factor of the output
    pub decimate_by: usize,

    /// Number of workers (1 = run in the calling thread)
    pub nprocs: usize,

    /// Output domain
    pub domain: Domain,

    /// Band definitions
    pub bands: BandSpec,

    /// Prototype lowpass order (taps - 1)
    pub order: usize,

    /// Sample rate in Hz
    pub sample_rate: f64,

    /// Real or analytic output
    pub output: OutputKind,

    /// Band window placement near DC
    pub left_bound: LeftBoundPolicy,

    /// Scatter destination of gathered bins
    pub placement: BinPlacement,

    /// Bandwidth safety margin for window sizing
    pub factor: f64,

    /// Realign output by the prototype's group delay
    pub delay_correction: bool,

    /// Worker pool polling
    pub poll: PollPolicy,
}

impl Default for FilterBankConfig {
    fn default() -> Self {
        Self {
            nch: 1,
            nsamp: 1 << 14,
            binsize: 1 << 10,
            decimate_by: 1,
            nprocs: 1,
            domain: Domain::Time,
            bands: BandSpec::default(),
            order: 256,
            sample_rate: 0.0,
            output: OutputKind::Real,
            left_bound: LeftBoundPolicy::FixedMargin,
            placement: BinPlacement::Spectral,
            factor: DEFAULT_FACTOR,
            delay_correction: true,
            poll: PollPolicy::default(),
        }
    }
}

impl FilterBankConfig {
    /// Config for bands given by center frequencies and a shared bandwidth
    pub fn with_centers(sample_rate: f64, center_freqs: Vec<f64>, bandwidth: f64) -> Self {
        Self {
            sample_rate,
            bands: BandSpec::Centers {
                center_freqs,
                bandwidth,
            },
            ..Default::default()
        }
    }

    /// Config for bands given by explicit edges
    pub fn with_edges(sample_rate: f64, edges: Vec<[f64; 2]>) -> Self {
        Self {
            sample_rate,
            bands: BandSpec::Edges(edges),
            ..Default::default()
        }
    }

    /// Set channel and sample counts
    pub fn with_signal_shape(mut self, nch: usize, nsamp: usize) -> Self {
        self.nch = nch;
        self.nsamp = nsamp;
        self
    }

    /// Set STFT window size
    pub fn with_binsize(mut self, binsize: usize) -> Self {
        self.binsize = binsize;
        self
    }

    /// Set decimation factor
    pub fn with_decimation(mut self, decimate_by: usize) -> Self {
        self.decimate_by = decimate_by;
        self
    }

    /// Set worker count
    pub fn with_workers(mut self, nprocs: usize) -> Self {
        self.nprocs = nprocs;
        self
    }

    /// Set prototype filter order
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Set output domain
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Set output kind
    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    /// Set left bound policy
    pub fn with_left_bound(mut self, policy: LeftBoundPolicy) -> Self {
        self.left_bound = policy;
        self
    }

    /// Set bin placement
    pub fn with_placement(mut self, placement: BinPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Set polling policy
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Decimated segment length
    pub fn decimated_binsize(&self) -> usize {
        self.binsize / self.decimate_by
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    /// Check scalar parameters; band checks live in `bank::bands`
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(FilterBankError::Configuration(msg));

        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return fail(format!("sample_rate must be positive, got {}", self.sample_rate));
        }
        if self.nch == 0 {
            return fail("nch must be at least 1".into());
        }
        if self.nsamp == 0 {
            return fail("nsamp must be at least 1".into());
        }
        if self.binsize < 4 || self.binsize % 2 != 0 {
            return fail(format!("binsize must be even and >= 4, got {}", self.binsize));
        }
        if self.decimate_by == 0 || self.binsize % self.decimate_by != 0 {
            return fail(format!(
                "decimate_by ({}) must be >= 1 and divide binsize ({})",
                self.decimate_by, self.binsize
            ));
        }
        if self.decimated_binsize() < 4 || self.decimated_binsize() % 2 != 0 {
            return fail(format!(
                "decimated binsize must be even and >= 4, got {}",
                self.decimated_binsize()
            ));
        }
        if self.nsamp % self.decimate_by != 0 {
            return fail(format!(
                "nsamp ({}) must be a multiple of decimate_by ({})",
                self.nsamp, self.decimate_by
            ));
        }
        if self.order == 0 || self.order >= self.binsize {
            return fail(format!(
                "order must be in 1..{}, got {}",
                self.binsize, self.order
            ));
        }
        if !(self.factor > 0.0 && self.factor <= 1.0) {
            return fail(format!("factor must be in (0, 1], got {}", self.factor));
        }
        if self.poll.spin_iterations == 0 && self.poll.submit_interval.is_zero() {
            return fail("poll policy must either spin or sleep".into());
        }
        Ok(())
    }
}
