//! Python bindings for the filter bank

use numpy::{PyArray3, PyArray4, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::bank::{BankOutput, FilterBank};
use crate::config::{BandSpec, Domain, FilterBankConfig, OutputKind};
use crate::filters::WindowType;

/// STFT filter bank exposed to Python
#[pyclass(name = "FilterBank")]
pub struct PyFilterBank {
    bank: FilterBank,
}

fn parse_domain(domain: &str) -> PyResult<Domain> {
    match domain.trim().to_ascii_lowercase().as_str() {
        "time" => Ok(Domain::Time),
        "freq" | "frequency" => Ok(Domain::Freq),
        other => Err(PyValueError::new_err(format!(
            "domain must be 'time' or 'freq', got '{}'",
            other
        ))),
    }
}

#[pymethods]
impl PyFilterBank {
    /// Create a filter bank
    ///
    /// Args:
    ///     nch: Number of channels
    ///     nsamp: Samples per channel
    ///     binsize: STFT window size
    ///     decimate_by: Output decimation factor
    ///     nprocs: Number of worker threads
    ///     domain: 'time' for band signals, 'freq' for band spectra
    ///     bandwidth: Shared band width in Hz (with center_freqs)
    ///     center_freqs: Band centers in Hz
    ///     freq_bands: Explicit (low, high) band edges in Hz
    ///     order: Prototype filter order
    ///     sample_rate: Sample rate in Hz
    ///     hilbert: Return analytic (complex) band signals
    #[new]
    #[pyo3(signature = (
        nch=1,
        nsamp=16384,
        binsize=1024,
        decimate_by=1,
        nprocs=1,
        domain="time",
        bandwidth=None,
        center_freqs=None,
        freq_bands=None,
        order=256,
        sample_rate=1000.0,
        hilbert=false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        nch: usize,
        nsamp: usize,
        binsize: usize,
        decimate_by: usize,
        nprocs: usize,
        domain: &str,
        bandwidth: Option<f64>,
        center_freqs: Option<Vec<f64>>,
        freq_bands: Option<Vec<(f64, f64)>>,
        order: usize,
        sample_rate: f64,
        hilbert: bool,
    ) -> PyResult<Self> {
        let bands = match (center_freqs, bandwidth, freq_bands) {
            (_, _, Some(edges)) => BandSpec::Edges(edges.into_iter().map(|(lo, hi)| [lo, hi]).collect()),
            (Some(center_freqs), Some(bandwidth), None) => BandSpec::Centers {
                center_freqs,
                bandwidth,
            },
            _ => {
                return Err(PyValueError::new_err(
                    "either freq_bands or center_freqs with bandwidth is required",
                ))
            }
        };

        let config = FilterBankConfig {
            bands,
            sample_rate,
            ..FilterBankConfig::default()
        }
        .with_signal_shape(nch, nsamp)
        .with_binsize(binsize)
        .with_decimation(decimate_by)
        .with_workers(nprocs)
        .with_order(order)
        .with_domain(parse_domain(domain)?)
        .with_output(if hilbert {
            OutputKind::Analytic
        } else {
            OutputKind::Real
        });

        Ok(Self {
            bank: FilterBank::new(config)?,
        })
    }

    /// Split a signal into bands
    ///
    /// Args:
    ///     x: Signal of shape (nch, nsamp)
    ///     window: Analysis window name (default: 'hamming')
    ///
    /// Returns:
    ///     (nch, nfreqs, nsamp // decimate_by) band signals, or
    ///     (nch, nwin, nfreqs, bins) band spectra in the 'freq' domain
    #[pyo3(signature = (x, window="hamming"))]
    fn analysis(&mut self, py: Python<'_>, x: PyReadonlyArray2<f64>, window: &str) -> PyResult<PyObject> {
        let window: WindowType = window.parse()?;
        let signal = x.as_array().to_owned();
        let bank = &mut self.bank;
        let output = py.allow_threads(move || bank.analysis(signal.view(), window))?;

        Ok(match output {
            BankOutput::Real(a) => PyArray3::from_owned_array(py, a).to_object(py),
            BankOutput::Analytic(a) => PyArray3::from_owned_array(py, a).to_object(py),
            BankOutput::Spectra(a) => PyArray4::from_owned_array(py, a).to_object(py),
        })
    }

    /// Stop the worker threads
    fn kill(&mut self) {
        self.bank.kill();
    }

    /// Number of bands
    #[getter]
    fn nfreqs(&self) -> usize {
        self.bank.nfreqs()
    }

    /// Prototype group delay in samples
    #[getter]
    fn delay(&self) -> usize {
        self.bank.delay()
    }

    /// Band center frequencies in Hz
    #[getter]
    fn center_freqs(&self) -> Vec<f64> {
        self.bank.bands().center_freqs()
    }

    /// Shared band width in Hz
    #[getter]
    fn bandwidth(&self) -> f64 {
        self.bank.bands().bandwidth()
    }
}
