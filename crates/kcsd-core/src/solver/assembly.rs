//! Forward matrix assembly.
//!
//! Constructs the three matrices that map basis-source coefficients to
//! observable quantities:
//!
//! - $B_{\text{pot}}[i, j] = V(|\mathbf{s}_i - \mathbf{e}_j|)$, the potential
//!   of source $i$ at electrode $j$ (sources × electrodes);
//! - $B_{\text{src}}[g, i] = \rho_i(\mathbf{g})$, the density of source $i$ at
//!   grid point $g$ (grid × sources);
//! - $B_{\text{interp}}[g, i] = V(|\mathbf{s}_i - \mathbf{g}|)$, the potential
//!   of source $i$ at grid point $g$ (grid × sources).
//!
//! $V$ is read from the [`DistanceTable`]. Every entry depends only on
//! immutable inputs, so fills are handed to a [`ComputeBackend`].

use log::debug;
use ndarray::Array2;

use kcsd_compute::ComputeBackend;
use kcsd_geometry::{distance, SourceSet};

use crate::basis::BasisShape;
use crate::dist_table::DistanceTable;
use crate::error::KcsdError;

/// Forward operators of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardMatrices {
    /// Source potentials at the electrodes (sources × electrodes).
    pub b_pot: Array2<f64>,
    /// Source densities on the grid (grid × sources).
    pub b_src: Array2<f64>,
    /// Source potentials on the grid (grid × sources).
    pub b_interp_pot: Array2<f64>,
}

/// Assemble the forward matrices.
///
/// # Arguments
/// * `sources` - Basis-source centres and support radius.
/// * `grid_points` - Estimation points in flat grid order.
/// * `electrodes` - Electrode positions.
/// * `table` - Potential of one source as a function of distance.
/// * `shape` - Basis density shape.
/// * `backend` - Scheduler for the element-wise fills.
///
/// # Errors
/// Returns [`KcsdError::NonFinite`] if any assembled entry is NaN or infinite.
pub fn assemble_forward_matrices(
    sources: &SourceSet,
    grid_points: &[[f64; 3]],
    electrodes: &[[f64; 3]],
    table: &DistanceTable,
    shape: BasisShape,
    backend: &dyn ComputeBackend,
) -> Result<ForwardMatrices, KcsdError> {
    let centres = sources.centres();
    let radius = sources.radius();

    let b_pot = backend.parallel_matrix_fill(centres.len(), electrodes.len(), &|i, j| {
        table.lookup(distance(&centres[i], &electrodes[j]))
    })?;
    check_finite(&b_pot, "B_pot")?;

    let b_src = backend.parallel_matrix_fill(grid_points.len(), centres.len(), &|g, i| {
        shape.density(&centres[i], radius, &grid_points[g])
    })?;
    check_finite(&b_src, "B_src")?;

    let b_interp_pot = backend.parallel_matrix_fill(grid_points.len(), centres.len(), &|g, i| {
        table.lookup(distance(&centres[i], &grid_points[g]))
    })?;
    check_finite(&b_interp_pot, "B_interp_pot")?;

    debug!(
        "Assembled forward matrices: {} sources, {} electrodes, {} grid points ({})",
        centres.len(),
        electrodes.len(),
        grid_points.len(),
        backend.device_info().name
    );

    Ok(ForwardMatrices {
        b_pot,
        b_src,
        b_interp_pot,
    })
}

pub(crate) fn check_finite(matrix: &Array2<f64>, name: &str) -> Result<(), KcsdError> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(KcsdError::NonFinite(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcsd_compute::SerialBackend;
    use kcsd_geometry::{layout_sources, Domain};

    fn fixture() -> (SourceSet, DistanceTable) {
        let domain = Domain::new([0.0; 3], [1.0; 3], [0.0; 3]).unwrap();
        let sources = layout_sources(&domain, 8, 0.5).unwrap();
        let dist_max = sources.dist_max([0.0; 3], [1.0; 3]);
        let table = DistanceTable::build(
            sources.radius(),
            dist_max,
            100,
            BasisShape::Step,
            1.0,
            &SerialBackend,
        )
        .unwrap();
        (sources, table)
    }

    #[test]
    fn test_matrix_shapes() {
        let (sources, table) = fixture();
        let electrodes = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.5, 0.5, 0.5]];
        let grid = [[0.2, 0.2, 0.2], [0.8, 0.2, 0.5]];
        let m = assemble_forward_matrices(
            &sources,
            &grid,
            &electrodes,
            &table,
            BasisShape::Step,
            &SerialBackend,
        )
        .unwrap();
        assert_eq!(m.b_pot.dim(), (sources.len(), 3));
        assert_eq!(m.b_src.dim(), (2, sources.len()));
        assert_eq!(m.b_interp_pot.dim(), (2, sources.len()));
    }

    #[test]
    fn test_coincident_points_read_table_origin() {
        let (sources, table) = fixture();
        let electrodes = vec![sources.centres()[3]];
        let m = assemble_forward_matrices(
            &sources,
            &electrodes,
            &electrodes,
            &table,
            BasisShape::Step,
            &SerialBackend,
        )
        .unwrap();
        assert_eq!(m.b_pot[[3, 0]], table.values()[0]);
        assert_eq!(m.b_interp_pot[[0, 3]], table.values()[0]);
        assert_eq!(m.b_src[[0, 3]], 1.0);
    }
}
