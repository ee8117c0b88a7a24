//! tfbank - STFT Filter Bank Core
//!
//! Splits multichannel signals into frequency bands with one shared prototype
//! lowpass, farming the per-window band projections out to a worker pool.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![allow(non_local_definitions)]

pub mod config;
pub mod error;
pub mod sample;
pub mod filters;
pub mod spectrum;
pub mod bank;
pub mod parallel;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use bank::{BankOutput, FilterBank};
pub use config::{BandSpec, BinPlacement, Domain, FilterBankConfig, LeftBoundPolicy, OutputKind, PollPolicy};
pub use error::{FilterBankError, Result};
pub use filters::WindowType;
