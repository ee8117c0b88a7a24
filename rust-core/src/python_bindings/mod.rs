//! PyO3 bindings for Python integration

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::error::FilterBankError;

mod filterbank_bindings;

impl From<FilterBankError> for PyErr {
    fn from(err: FilterBankError) -> PyErr {
        match err {
            FilterBankError::Configuration(_)
            | FilterBankError::Bounds { .. }
            | FilterBankError::ShapeMismatch { .. } => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

/// Python module definition
#[pymodule]
fn tfbank(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<filterbank_bindings::PyFilterBank>()?;
    Ok(())
}
