//! CPU compute backend using Rayon for shared-memory parallelism.

use std::sync::Arc;

use ndarray::Array2;
use rayon::prelude::*;

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};

/// CPU backend that parallelises matrix fills across threads via Rayon.
///
/// Work is split by rows: each thread owns a disjoint slice of the output
/// buffer, so no synchronisation is needed beyond the final join.
pub struct CpuBackend {
    num_threads: usize,
    /// Dedicated pool when a thread count was requested; the global pool otherwise.
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuBackend {
    /// Create a new CPU backend using the global Rayon pool.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend running on its own pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        if num_threads == 0 {
            return Err(ComputeError::Unavailable(
                "CPU backend needs at least one thread".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ComputeError::DeviceError(e.to_string()))?;
        Ok(Self {
            num_threads,
            pool: Some(Arc::new(pool)),
        })
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn fill_rows(
    rows: usize,
    cols: usize,
    fill_fn: &(dyn Fn(usize, usize) -> f64 + Send + Sync),
) -> Result<Array2<f64>, ComputeError> {
    let mut data = vec![0.0; rows * cols];
    if cols > 0 {
        data.par_chunks_mut(cols).enumerate().for_each(|(i, row)| {
            for (j, value) in row.iter_mut().enumerate() {
                *value = fill_fn(i, j);
            }
        });
    }

    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| ComputeError::DeviceError(e.to_string()))
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            compute_units: Some(self.num_threads),
        }
    }

    fn parallel_matrix_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> f64 + Send + Sync),
    ) -> Result<Array2<f64>, ComputeError> {
        match &self.pool {
            Some(pool) => pool.install(|| fill_rows(rows, cols, fill_fn)),
            None => fill_rows(rows, cols, fill_fn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SerialBackend;

    fn element(i: usize, j: usize) -> f64 {
        ((i as f64) * 0.37 + (j as f64) * 1.13).sin() / (1.0 + (i + j) as f64)
    }

    #[test]
    fn test_cpu_fill_matches_serial_bitwise() {
        let serial = SerialBackend
            .parallel_matrix_fill(57, 13, &element)
            .unwrap();
        let cpu = CpuBackend::new()
            .parallel_matrix_fill(57, 13, &element)
            .unwrap();
        assert_eq!(serial, cpu);
    }

    #[test]
    fn test_dedicated_pool() {
        let backend = CpuBackend::with_threads(2).unwrap();
        assert_eq!(backend.device_info().compute_units, Some(2));
        let m = backend.parallel_matrix_fill(4, 4, &element).unwrap();
        assert_eq!(m[[3, 2]], element(3, 2));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(CpuBackend::with_threads(0).is_err());
    }

    #[test]
    fn test_empty_matrix() {
        let m = CpuBackend::new()
            .parallel_matrix_fill(5, 0, &element)
            .unwrap();
        assert_eq!(m.shape(), &[5, 0]);
    }
}
