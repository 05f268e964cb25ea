//! The kCSD model: configuration, matrix assembly and estimation.
//!
//! A [`Kcsd3d`] holds validated inputs: electrodes, potentials, the resolved
//! domain, estimation grid and source lattice. [`Kcsd3d::calculate_matrices`]
//! performs all heavy work once and returns an immutable [`AssembledModel`],
//! from which any number of estimates and cross-validation runs can be drawn.
//!
//! # Method
//!
//! With forward matrix $B_{\text{pot}}$ (sources × electrodes) the kernel in
//! electrode space is $K = B_{\text{pot}}^\top B_{\text{pot}}$. The
//! representer coefficients solve
//! $$(K + \lambda I)\,\boldsymbol\beta = \mathbf{v}$$
//! and fields on the grid follow from the grid × electrodes kernels
//! $B_{\text{src}} B_{\text{pot}}$ (CSD) and $B_{\text{interp}} B_{\text{pot}}$
//! (potential).

pub mod assembly;
pub mod direct;

use std::fmt;

use log::{debug, info};
use ndarray::{Array1, Array2, Array3, ArrayView1};

use kcsd_compute::{default_backend, ComputeBackend};
use kcsd_geometry::domain::{bounding_box, BoundOverrides};
use kcsd_geometry::{distance, layout_sources, Domain, EstimationGrid, SourceSet};

use crate::basis::BasisShape;
use crate::cross_validation::{self, CrossValidation, LambdaSelection};
use crate::dist_table::{DistanceTable, DIST_TABLE_DENSITY};
use crate::error::KcsdError;
use crate::fields::project_to_grid;
use crate::types::{Estimate, KcsdParams};
use assembly::{assemble_forward_matrices, check_finite, ForwardMatrices};

/// Minimum number of electrodes accepted by [`Kcsd3d::new`].
pub const MIN_ELECTRODES: usize = 4;

/// Default grid spacing as a fraction of the axis extent.
const DEFAULT_GRID_FRACTION: f64 = 0.05;

/// A configured kCSD model, ready for matrix assembly.
#[derive(Debug, Clone)]
pub struct Kcsd3d {
    electrodes: Vec<[f64; 3]>,
    potentials: Array1<f64>,
    basis: BasisShape,
    sigma: f64,
    lambda: f64,
    grid: EstimationGrid,
    sources: SourceSet,
    dist_max: f64,
}

impl Kcsd3d {
    /// Validate inputs and resolve every derived parameter.
    ///
    /// No matrix work happens here; all configuration errors surface before
    /// [`calculate_matrices`](Self::calculate_matrices) is called.
    ///
    /// # Errors
    /// Returns [`KcsdError::Configuration`] when positions and potentials
    /// disagree in length, fewer than [`MIN_ELECTRODES`] electrodes are given,
    /// any input is non-finite, a parameter is out of range, or the domain
    /// cannot hold the requested source lattice.
    pub fn new(
        electrodes: Vec<[f64; 3]>,
        potentials: Vec<f64>,
        params: &KcsdParams,
    ) -> Result<Self, KcsdError> {
        if electrodes.len() != potentials.len() {
            return Err(KcsdError::Configuration(format!(
                "{} electrode positions but {} potentials",
                electrodes.len(),
                potentials.len()
            )));
        }
        if electrodes.len() < MIN_ELECTRODES {
            return Err(KcsdError::Configuration(format!(
                "At least {} electrodes are required, got {}",
                MIN_ELECTRODES,
                electrodes.len()
            )));
        }
        if let Some(i) = electrodes
            .iter()
            .position(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err(KcsdError::Configuration(format!(
                "Electrode {i} has a non-finite coordinate: {:?}",
                electrodes[i]
            )));
        }
        if let Some(i) = potentials.iter().position(|v| !v.is_finite()) {
            return Err(KcsdError::Configuration(format!(
                "Potential at electrode {i} is not finite: {}",
                potentials[i]
            )));
        }
        if !params.sigma.is_finite() || params.sigma <= 0.0 {
            return Err(KcsdError::Configuration(format!(
                "sigma must be positive, got {}",
                params.sigma
            )));
        }
        if !params.lambda.is_finite() || params.lambda < 0.0 {
            return Err(KcsdError::Configuration(format!(
                "lambda must be finite and non-negative, got {}",
                params.lambda
            )));
        }

        let overrides = BoundOverrides {
            min: params.min_overrides(),
            max: params.max_overrides(),
        };
        let domain = Domain::from_positions(&electrodes, &overrides, params.extension)?;

        let requested = params.grid_spacing();
        let mut spacing = [0.0; 3];
        for axis in 0..3 {
            spacing[axis] = requested[axis].unwrap_or(DEFAULT_GRID_FRACTION * domain.extent(axis));
        }
        let grid = EstimationGrid::new(&domain, spacing)?;

        let r_init = match params.r_init {
            Some(r) => r,
            None => default_radius(&electrodes)?,
        };
        let sources = layout_sources(&domain, params.n_sources, r_init)?;

        let (elec_min, elec_max) = bounding_box(&electrodes);
        let (grid_min, grid_max) = grid.bounds();
        let mut obs_min = [0.0; 3];
        let mut obs_max = [0.0; 3];
        for axis in 0..3 {
            obs_min[axis] = elec_min[axis].min(grid_min[axis]);
            obs_max[axis] = elec_max[axis].max(grid_max[axis]);
        }
        let dist_max = sources.dist_max(obs_min, obs_max);

        debug!(
            "Configured model: {} electrodes, {} sources (R={:.4e}), grid {:?}, dist_max={:.4e}",
            electrodes.len(),
            sources.len(),
            sources.radius(),
            grid.shape(),
            dist_max
        );

        Ok(Self {
            electrodes,
            potentials: Array1::from_vec(potentials),
            basis: params.basis,
            sigma: params.sigma,
            lambda: params.lambda,
            grid,
            sources,
            dist_max,
        })
    }

    /// Build the distance table and all matrices on the default backend.
    pub fn calculate_matrices(&self) -> Result<AssembledModel, KcsdError> {
        self.calculate_matrices_with(&default_backend())
    }

    /// Build the distance table and all matrices on `backend`.
    pub fn calculate_matrices_with(
        &self,
        backend: &dyn ComputeBackend,
    ) -> Result<AssembledModel, KcsdError> {
        let table = DistanceTable::build(
            self.sources.radius(),
            self.dist_max,
            DIST_TABLE_DENSITY,
            self.basis,
            self.sigma,
            backend,
        )?;

        let grid_points = self.grid.points();
        let forward = assemble_forward_matrices(
            &self.sources,
            &grid_points,
            &self.electrodes,
            &table,
            self.basis,
            backend,
        )?;
        let kernels = KernelMatrices::from_forward(&forward)?;

        info!(
            "Assembled kCSD matrices: {} electrodes, {} sources, {} grid points",
            self.electrodes.len(),
            self.sources.len(),
            self.grid.len()
        );

        Ok(AssembledModel {
            grid: self.grid.clone(),
            potentials: self.potentials.clone(),
            lambda: self.lambda,
            table,
            forward,
            kernels,
        })
    }

    pub fn electrodes(&self) -> &[[f64; 3]] {
        &self.electrodes
    }

    pub fn basis(&self) -> BasisShape {
        self.basis
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn grid(&self) -> &EstimationGrid {
        &self.grid
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Upper bound of every source-to-observation distance.
    pub fn dist_max(&self) -> f64 {
        self.dist_max
    }
}

impl fmt::Display for Kcsd3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (nx, ny, nz) = self.grid.shape();
        let [sx, sy, sz] = self.sources.shape();
        writeln!(f, "kCSD 3D model")?;
        writeln!(f, "  electrodes: {}", self.electrodes.len())?;
        writeln!(
            f,
            "  sources:    {} ({}x{}x{}, {} basis)",
            self.sources.len(),
            sx,
            sy,
            sz,
            self.basis
        )?;
        writeln!(
            f,
            "  radius:     {:.4e} (lattice step {:.4e})",
            self.sources.radius(),
            self.sources.spacing()
        )?;
        writeln!(f, "  dist_max:   {:.4e}", self.dist_max)?;
        writeln!(f, "  grid:       {}x{}x{} ({} points)", nx, ny, nz, self.grid.len())?;
        write!(f, "  sigma: {}, lambda: {:e}", self.sigma, self.lambda)
    }
}

/// Twice the smallest non-zero distance between two electrodes.
fn default_radius(electrodes: &[[f64; 3]]) -> Result<f64, KcsdError> {
    let mut smallest = f64::INFINITY;
    for (i, a) in electrodes.iter().enumerate() {
        for b in &electrodes[i + 1..] {
            let d = distance(a, b);
            if d > 0.0 && d < smallest {
                smallest = d;
            }
        }
    }
    if smallest.is_finite() {
        Ok(2.0 * smallest)
    } else {
        Err(KcsdError::Configuration(
            "All electrodes coincide; set r_init explicitly".into(),
        ))
    }
}

/// Kernels in electrode space.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelMatrices {
    /// $B_{\text{pot}}^\top B_{\text{pot}}$ (electrodes × electrodes).
    pub k_pot: Array2<f64>,
    /// $B_{\text{src}} B_{\text{pot}}$ (grid × electrodes).
    pub k_interp_cross: Array2<f64>,
    /// $B_{\text{interp}} B_{\text{pot}}$ (grid × electrodes).
    pub interp_pot: Array2<f64>,
}

impl KernelMatrices {
    pub fn from_forward(forward: &ForwardMatrices) -> Result<Self, KcsdError> {
        let k_pot = forward.b_pot.t().dot(&forward.b_pot);
        check_finite(&k_pot, "K_pot")?;
        let k_interp_cross = forward.b_src.dot(&forward.b_pot);
        check_finite(&k_interp_cross, "K_interp_cross")?;
        let interp_pot = forward.b_interp_pot.dot(&forward.b_pot);
        check_finite(&interp_pot, "Interp_pot")?;
        Ok(Self {
            k_pot,
            k_interp_cross,
            interp_pot,
        })
    }
}

/// All matrices of a model, computed once and shared by every estimate.
#[derive(Debug, Clone)]
pub struct AssembledModel {
    grid: EstimationGrid,
    potentials: Array1<f64>,
    lambda: f64,
    table: DistanceTable,
    forward: ForwardMatrices,
    kernels: KernelMatrices,
}

impl AssembledModel {
    /// Representer coefficients for `potentials` measured at the model's electrodes.
    pub fn beta(
        &self,
        potentials: ArrayView1<'_, f64>,
        lambda: f64,
    ) -> Result<Array1<f64>, KcsdError> {
        if potentials.len() != self.potentials.len() {
            return Err(KcsdError::Configuration(format!(
                "Expected {} potentials, got {}",
                self.potentials.len(),
                potentials.len()
            )));
        }
        if let Some(i) = potentials.iter().position(|v| !v.is_finite()) {
            return Err(KcsdError::Configuration(format!(
                "Potential at electrode {i} is not finite"
            )));
        }
        direct::solve_regularised(self.kernels.k_pot.view(), lambda, potentials)
    }

    /// Potential and CSD for a new measurement at the same electrodes.
    pub fn estimate_for(
        &self,
        potentials: ArrayView1<'_, f64>,
        lambda: f64,
    ) -> Result<Estimate, KcsdError> {
        let beta = self.beta(potentials, lambda)?;
        let pots = self.project(&self.kernels.interp_pot, &beta, "potential")?;
        let csd = self.project(&self.kernels.k_interp_cross, &beta, "CSD")?;
        Ok(Estimate {
            lambda,
            beta,
            pots,
            csd,
        })
    }

    /// Potential and CSD of the measured potentials.
    pub fn estimate(&self, lambda: f64) -> Result<Estimate, KcsdError> {
        self.estimate_for(self.potentials.view(), lambda)
    }

    /// Estimated potential on the grid.
    pub fn estimate_pots(&self, lambda: f64) -> Result<Array3<f64>, KcsdError> {
        let beta = self.beta(self.potentials.view(), lambda)?;
        self.project(&self.kernels.interp_pot, &beta, "potential")
    }

    /// Estimated current source density on the grid.
    pub fn estimate_csd(&self, lambda: f64) -> Result<Array3<f64>, KcsdError> {
        let beta = self.beta(self.potentials.view(), lambda)?;
        self.project(&self.kernels.k_interp_cross, &beta, "CSD")
    }

    fn project(
        &self,
        kernel: &Array2<f64>,
        beta: &Array1<f64>,
        name: &str,
    ) -> Result<Array3<f64>, KcsdError> {
        project_to_grid(kernel.view(), beta.view(), &self.grid, name)
    }

    /// Select lambda for the measured potentials by cross-validation on the
    /// default backend.
    pub fn choose_lambda(&self, settings: &CrossValidation) -> Result<LambdaSelection, KcsdError> {
        self.choose_lambda_with(settings, &default_backend())
    }

    /// Select lambda for the measured potentials, scoring candidates on `backend`.
    pub fn choose_lambda_with(
        &self,
        settings: &CrossValidation,
        backend: &dyn ComputeBackend,
    ) -> Result<LambdaSelection, KcsdError> {
        cross_validation::choose_lambda_with(
            self.kernels.k_pot.view(),
            self.potentials.view(),
            settings,
            backend,
        )
    }

    /// Regularisation parameter configured for the model.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn grid(&self) -> &EstimationGrid {
        &self.grid
    }

    pub fn table(&self) -> &DistanceTable {
        &self.table
    }

    pub fn forward(&self) -> &ForwardMatrices {
        &self.forward
    }

    pub fn kernels(&self) -> &KernelMatrices {
        &self.kernels
    }
}
