//! # kCSD Geometry
//!
//! Spatial bookkeeping for the kCSD framework. This crate provides:
//!
//! - **Domains** ([`domain`]): Axis-aligned estimation boxes derived from
//!   electrode positions, with per-axis extension margins.
//! - **Estimation grids** ([`grid`]): Regular 3D lattices on which potential
//!   and CSD are reported.
//! - **Source lattices** ([`lattice`]): Placement of basis-source centres and
//!   the shared support radius.
//! - **File parsers** ([`parsers`]): Import electrode recordings from plain
//!   text files.

pub mod domain;
pub mod grid;
pub mod lattice;
pub mod parsers;

use thiserror::Error;

pub use domain::Domain;
pub use grid::EstimationGrid;
pub use lattice::{layout_sources, SourceSet};

/// Errors raised while resolving domains, grids and source lattices.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Degenerate domain: {0}")]
    DegenerateDomain(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Evenly spaced samples over `[start, end]`, endpoints included.
pub(crate) fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        end
                    } else {
                        start + (end - start) * i as f64 / last
                    }
                })
                .collect()
        }
    }
}
