//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over how the independent entries of
//! a dense matrix are scheduled, so that the assembly code in `kcsd-core`
//! stays agnostic of threading.

use ndarray::Array2;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Device error: {0}")]
    DeviceError(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: Option<usize>,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Serial,
    Cpu,
}

/// Abstraction over compute backends.
///
/// The fill function must be pure: every `(i, j)` entry is computed from
/// immutable inputs only, so backends may evaluate entries in any order and
/// on any thread. Results are therefore identical across backends.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Build a `rows x cols` matrix whose entry `(i, j)` is `fill_fn(i, j)`.
    ///
    /// This is the entry point for the forward-matrix assembly: each entry
    /// depends only on one source and one observation point.
    fn parallel_matrix_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> f64 + Send + Sync),
    ) -> Result<Array2<f64>, ComputeError>;
}
