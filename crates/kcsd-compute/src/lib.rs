//! # kCSD Compute
//!
//! Compute backend abstraction for the kCSD framework. This crate provides a
//! [`ComputeBackend`](backend::ComputeBackend) trait that isolates the
//! numerical code from how element-wise matrix fills are scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Notes |
//! |---------|-------------|-------|
//! | Serial | always | Single-threaded reference |
//! | CPU (Rayon) | `cpu` (default) | Shared-memory parallel fill |

pub mod backend;
pub mod serial;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};
pub use serial::SerialBackend;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

/// The backend used when the caller does not choose one.
#[cfg(feature = "cpu")]
pub fn default_backend() -> CpuBackend {
    CpuBackend::new()
}

/// The backend used when the caller does not choose one.
#[cfg(not(feature = "cpu"))]
pub fn default_backend() -> SerialBackend {
    SerialBackend
}
