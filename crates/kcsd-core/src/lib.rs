//! # kCSD Core
//!
//! The numerical backbone of the kCSD framework. This crate estimates the
//! current source density (CSD) and the potential in a 3D volume from
//! potentials sampled at a sparse set of electrodes, using kernel Current
//! Source Density estimation.
//!
//! ## Architecture
//!
//! A [`solver::Kcsd3d`] validates the inputs and resolves the domain, grid and
//! basis-source lattice. [`solver::Kcsd3d::calculate_matrices`] builds the
//! distance table and the forward and kernel matrices once, returning an
//! immutable [`solver::AssembledModel`] that serves estimates for any
//! regularisation parameter and runs cross-validation.
//!
//! ## Modules
//!
//! - [`types`]: Model parameters and estimate container.
//! - [`basis`]: Basis-source density shapes.
//! - [`dist_table`]: Potential of one basis source versus distance.
//! - [`solver`]: Model configuration, matrix assembly and the kernel solve.
//! - [`fields`]: Projection of coefficients onto the estimation grid.
//! - [`cross_validation`]: Regularisation parameter selection.
//! - [`error`]: The [`KcsdError`] type.

pub mod basis;
pub mod cross_validation;
pub mod dist_table;
pub mod error;
pub mod fields;
pub mod solver;
pub mod types;

pub use basis::BasisShape;
pub use cross_validation::{CrossValidation, FoldStrategy, LambdaSelection};
pub use error::KcsdError;
pub use solver::{AssembledModel, Kcsd3d};
pub use types::{Estimate, KcsdParams};
