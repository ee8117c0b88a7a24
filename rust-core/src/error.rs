//! Error types for the filter bank
//!
//! Configuration problems are raised at construction, before any worker
//! thread exists. Worker problems surface on the next `submit()`.

use std::time::Duration;
use thiserror::Error;

/// Filter bank errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterBankError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Index {index} out of bounds for {array} (valid range 0..{extent})")]
    Bounds {
        array: &'static str,
        index: i64,
        extent: usize,
    },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Worker {worker} failed: {message}")]
    WorkerFailed { worker: usize, message: String },

    #[error("Worker {worker} exited while an epoch was pending")]
    WorkerDied { worker: usize },

    #[error("Timed out after {waited:?} waiting for worker {worker}")]
    WorkerTimeout { worker: usize, waited: Duration },

    #[error("Dispatcher has been shut down")]
    ShutDown,

    #[error("FFT error: {0}")]
    Fft(String),
}

impl FilterBankError {
    /// True for errors raised by the worker pool rather than by configuration
    pub fn is_worker_lifecycle(&self) -> bool {
        matches!(
            self,
            FilterBankError::WorkerFailed { .. }
                | FilterBankError::WorkerDied { .. }
                | FilterBankError::WorkerTimeout { .. }
                | FilterBankError::ShutDown
        )
    }

    /// Fatal errors leave the pool unusable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FilterBankError::WorkerDied { .. } | FilterBankError::WorkerTimeout { .. }
        )
    }
}

impl From<realfft::FftError> for FilterBankError {
    fn from(err: realfft::FftError) -> Self {
        FilterBankError::Fft(err.to_string())
    }
}

/// Result type for filter bank operations
pub type Result<T> = std::result::Result<T, FilterBankError>;
