//! Regular estimation grids.
//!
//! The estimated potential and CSD are reported on a regular lattice spanning
//! the (unextended) domain. Points are stored per axis; the flat point index
//! is row-major over `(ix, iy, iz)` so that a vector of grid values reshapes
//! directly into an `(nx, ny, nz)` array.

use crate::domain::{axis_name, Domain};
use crate::{linspace, GeometryError};

/// A regular 3D lattice of estimation points.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationGrid {
    axes: [Vec<f64>; 3],
}

impl EstimationGrid {
    /// Build a grid over `domain` with the requested per-axis spacing.
    ///
    /// An axis of zero extent yields a single layer and ignores its spacing.
    /// Otherwise the axis holds `round(extent / spacing) + 1` points (at least
    /// two, so both bounds are always sampled).
    pub fn new(domain: &Domain, spacing: [f64; 3]) -> Result<Self, GeometryError> {
        let mut axes: [Vec<f64>; 3] = Default::default();
        for axis in 0..3 {
            let extent = domain.extent(axis);
            let scale = domain.min[axis].abs().max(domain.max[axis].abs()).max(1.0);
            if extent <= 1e-12 * scale {
                axes[axis] = vec![domain.min[axis]];
                continue;
            }
            let step = spacing[axis];
            if !step.is_finite() || step <= 0.0 {
                return Err(GeometryError::InvalidParameter(format!(
                    "grid spacing along {} must be positive, got {}",
                    axis_name(axis),
                    step
                )));
            }
            let n = ((extent / step).round() as usize + 1).max(2);
            axes[axis] = linspace(domain.min[axis], domain.max[axis], n);
        }
        Ok(Self { axes })
    }

    /// Number of points along each axis.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.axes[0].len(), self.axes[1].len(), self.axes[2].len())
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.axes.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates along one axis.
    pub fn axis(&self, axis: usize) -> &[f64] {
        &self.axes[axis]
    }

    /// Flat index of the point `(ix, iy, iz)`.
    pub fn flat_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        let (_, ny, nz) = self.shape();
        (ix * ny + iy) * nz + iz
    }

    /// Position of the point with flat index `index`.
    pub fn point(&self, index: usize) -> [f64; 3] {
        let (_, ny, nz) = self.shape();
        let iz = index % nz;
        let iy = (index / nz) % ny;
        let ix = index / (ny * nz);
        [self.axes[0][ix], self.axes[1][iy], self.axes[2][iz]]
    }

    /// All grid positions in flat-index order.
    pub fn points(&self) -> Vec<[f64; 3]> {
        let mut out = Vec::with_capacity(self.len());
        for &x in &self.axes[0] {
            for &y in &self.axes[1] {
                for &z in &self.axes[2] {
                    out.push([x, y, z]);
                }
            }
        }
        out
    }

    /// Lower and upper corners of the grid.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for axis in 0..3 {
            lo[axis] = self.axes[axis][0];
            hi[axis] = self.axes[axis][self.axes[axis].len() - 1];
        }
        (lo, hi)
    }
}
