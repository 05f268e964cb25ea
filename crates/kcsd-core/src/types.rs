//! Core types shared across the kCSD pipeline.
//!
//! This module defines the model parameters accepted by
//! [`Kcsd3d::new`](crate::solver::Kcsd3d::new) and the result container
//! returned by the estimation calls.

use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};

use crate::basis::BasisShape;

/// Parameters of a kCSD model.
///
/// Every field is optional in serialised form; unset bounds, grid spacings
/// and the initial radius are derived from the electrode positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KcsdParams {
    /// Conductivity of the medium (S/m).
    pub sigma: f64,
    /// Requested number of basis sources; the lattice may hold a different count.
    pub n_sources: usize,
    /// Basis-source shape.
    pub basis: BasisShape,
    pub x_min: Option<f64>,
    pub x_max: Option<f64>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub z_min: Option<f64>,
    pub z_max: Option<f64>,
    /// Margin added on both sides of each axis when placing sources.
    pub extension: [f64; 3],
    /// Estimation grid spacing; defaults to 5 % of the axis extent.
    pub grid_dx: Option<f64>,
    pub grid_dy: Option<f64>,
    pub grid_dz: Option<f64>,
    /// Initial guess of the basis support radius.
    pub r_init: Option<f64>,
    /// Regularisation parameter used when none is passed explicitly.
    pub lambda: f64,
}

impl Default for KcsdParams {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            n_sources: 100,
            basis: BasisShape::Gaussian,
            x_min: None,
            x_max: None,
            y_min: None,
            y_max: None,
            z_min: None,
            z_max: None,
            extension: [0.0; 3],
            grid_dx: None,
            grid_dy: None,
            grid_dz: None,
            r_init: None,
            lambda: 0.0,
        }
    }
}

impl KcsdParams {
    /// Explicit lower bounds per axis.
    pub fn min_overrides(&self) -> [Option<f64>; 3] {
        [self.x_min, self.y_min, self.z_min]
    }

    /// Explicit upper bounds per axis.
    pub fn max_overrides(&self) -> [Option<f64>; 3] {
        [self.x_max, self.y_max, self.z_max]
    }

    /// Explicit grid spacings per axis.
    pub fn grid_spacing(&self) -> [Option<f64>; 3] {
        [self.grid_dx, self.grid_dy, self.grid_dz]
    }
}

/// Potential and CSD estimated with one regularisation parameter.
#[derive(Debug, Clone)]
pub struct Estimate {
    /// Regularisation parameter used for the solve.
    pub lambda: f64,
    /// Representer coefficients, one per electrode.
    pub beta: Array1<f64>,
    /// Estimated potential on the grid, shaped `(nx, ny, nz)`.
    pub pots: Array3<f64>,
    /// Estimated current source density on the grid, shaped `(nx, ny, nz)`.
    pub csd: Array3<f64>,
}
