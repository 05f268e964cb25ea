//! Error type shared by every stage of the kCSD pipeline.

use kcsd_compute::ComputeError;
use kcsd_geometry::GeometryError;
use thiserror::Error;

/// Errors that can occur while configuring, assembling or solving a model.
#[derive(Debug, Error)]
pub enum KcsdError {
    /// Invalid inputs or parameters, reported before any matrix work.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The regularised kernel matrix could not be inverted.
    #[error(
        "Singular kernel matrix ({dim}x{dim}, lambda = {lambda:e}, pivot ratio {pivot_ratio:.2e}); \
         use a positive regularisation parameter"
    )]
    SingularMatrix {
        dim: usize,
        lambda: f64,
        pivot_ratio: f64,
    },

    /// The distance table integration produced a non-finite value.
    #[error("Numerical integration failed at distance {distance:.4e} (value: {value})")]
    NumericalIntegration { distance: f64, value: f64 },

    /// A matrix or field contains NaN or infinite entries.
    #[error("Non-finite values in {0}")]
    NonFinite(String),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),
}

impl From<GeometryError> for KcsdError {
    fn from(err: GeometryError) -> Self {
        KcsdError::Configuration(err.to_string())
    }
}
