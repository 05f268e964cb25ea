//! Projection of representer coefficients onto the estimation grid.
//!
//! Once the coefficients $\boldsymbol\beta$ are known, any field that is
//! linear in the sources is recovered at grid point $g$ as
//!
//! $$
//! f(\mathbf{g}) = \sum_{i=1}^{N} \beta_i \, P[g, i]
//! $$
//!
//! where $P$ is a grid × electrodes projection: the cross kernel for the CSD
//! and the interpolation kernel for the potential.

use ndarray::{Array3, ArrayView1, ArrayView2};

use kcsd_geometry::EstimationGrid;

use crate::error::KcsdError;

/// Project `beta` through `projection` and reshape to the grid.
///
/// # Arguments
/// * `projection` - Grid × electrodes matrix in flat grid order.
/// * `beta` - Representer coefficients.
/// * `grid` - Grid that fixes the output shape.
/// * `name` - Field name used in error messages.
pub fn project_to_grid(
    projection: ArrayView2<'_, f64>,
    beta: ArrayView1<'_, f64>,
    grid: &EstimationGrid,
    name: &str,
) -> Result<Array3<f64>, KcsdError> {
    if projection.nrows() != grid.len() || projection.ncols() != beta.len() {
        return Err(KcsdError::Configuration(format!(
            "Projection for {name} is {}x{}, expected {}x{}",
            projection.nrows(),
            projection.ncols(),
            grid.len(),
            beta.len()
        )));
    }

    let flat = projection.dot(&beta);
    if flat.iter().any(|v| !v.is_finite()) {
        return Err(KcsdError::NonFinite(format!("estimated {name}")));
    }

    flat.into_shape(grid.shape())
        .map_err(|e| KcsdError::Configuration(format!("Cannot reshape {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcsd_geometry::Domain;
    use ndarray::{array, Array2};

    fn grid() -> EstimationGrid {
        let domain = Domain::new([0.0; 3], [1.0, 1.0, 0.0], [0.0; 3]).unwrap();
        EstimationGrid::new(&domain, [1.0, 0.5, 1.0]).unwrap()
    }

    #[test]
    fn test_projection_reshapes_in_grid_order() {
        let grid = grid();
        assert_eq!(grid.shape(), (2, 3, 1));
        // Row g holds [g, 1]: the field at g is 2g + 1 for beta = [2, 1]
        let projection =
            Array2::from_shape_fn((6, 2), |(g, i)| if i == 0 { g as f64 } else { 1.0 });
        let beta = array![2.0, 1.0];

        let field = project_to_grid(projection.view(), beta.view(), &grid, "test").unwrap();
        assert_eq!(field.dim(), (2, 3, 1));
        assert_eq!(field[[0, 0, 0]], 1.0);
        assert_eq!(field[[0, 2, 0]], 5.0);
        assert_eq!(field[[1, 0, 0]], 7.0);
    }

    #[test]
    fn test_non_finite_field_rejected() {
        let grid = grid();
        let projection = Array2::from_elem((6, 1), f64::NAN);
        let beta = array![1.0];
        assert!(matches!(
            project_to_grid(projection.view(), beta.view(), &grid, "csd"),
            Err(KcsdError::NonFinite(_))
        ));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let grid = grid();
        let projection = Array2::zeros((5, 1));
        let beta = array![1.0];
        assert!(project_to_grid(projection.view(), beta.view(), &grid, "pots").is_err());
    }
}
