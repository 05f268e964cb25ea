//! Direct solver for the regularised kernel system.
//!
//! Uses LU decomposition with partial pivoting via `faer` to solve the
//! $N \times N$ system
//! $$(\mathbf{K} + \lambda \mathbf{I})\,\boldsymbol{\beta} = \mathbf{v}$$
//! where $N$ is the number of electrodes. Electrode counts are small enough
//! that a dense factorisation is always appropriate.

use faer::linalg::solvers::SpSolver;
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::KcsdError;

/// Solve $(\mathbf{K} + \lambda \mathbf{I})\,\boldsymbol{\beta} = \mathbf{v}$.
///
/// The system is rejected as singular when the smallest pivot magnitude of
/// the factorisation is at most $N \varepsilon$ times the largest one.
///
/// # Arguments
/// * `kernel` - The $N \times N$ kernel matrix $\mathbf{K}$.
/// * `lambda` - Non-negative regularisation parameter.
/// * `rhs` - Measured potentials $\mathbf{v}$ (length $N$).
pub fn solve_regularised(
    kernel: ArrayView2<'_, f64>,
    lambda: f64,
    rhs: ArrayView1<'_, f64>,
) -> Result<Array1<f64>, KcsdError> {
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(KcsdError::Configuration(format!(
            "lambda must be finite and non-negative, got {lambda}"
        )));
    }
    let dim = kernel.nrows();
    if dim != kernel.ncols() || dim != rhs.len() {
        return Err(KcsdError::Configuration(format!(
            "Kernel is {}x{} but {} potentials were given",
            kernel.nrows(),
            kernel.ncols(),
            rhs.len()
        )));
    }
    if dim == 0 {
        return Ok(Array1::zeros(0));
    }

    let faer_mat = faer::Mat::<f64>::from_fn(dim, dim, |i, j| {
        if i == j {
            kernel[[i, j]] + lambda
        } else {
            kernel[[i, j]]
        }
    });
    let faer_rhs = faer::Col::<f64>::from_fn(dim, |i| rhs[i]);

    // LU decomposition with partial pivoting
    let lu = faer_mat.partial_piv_lu();

    let u = lu.compute_u();
    let mut smallest = f64::INFINITY;
    let mut largest = 0.0_f64;
    for i in 0..dim {
        let pivot = u.read(i, i).abs();
        // A zero pivot leaves NaN in the trailing factors
        smallest = if pivot.is_nan() {
            0.0
        } else {
            smallest.min(pivot)
        };
        largest = largest.max(pivot);
    }
    let threshold = dim as f64 * f64::EPSILON * largest;
    if !(smallest > threshold) {
        let pivot_ratio = if largest > 0.0 {
            smallest / largest
        } else {
            0.0
        };
        return Err(KcsdError::SingularMatrix {
            dim,
            lambda,
            pivot_ratio,
        });
    }

    let faer_sol = lu.solve(&faer_rhs);
    let solution = Array1::from_vec((0..dim).map(|i| faer_sol[i]).collect());

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(KcsdError::NonFinite("kernel solution".into()));
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_solve_identity_system() {
        let dim = 6;
        let matrix = Array2::<f64>::eye(dim);
        let rhs = Array1::from_vec((0..dim).map(|i| i as f64).collect());

        let sol = solve_regularised(matrix.view(), 0.0, rhs.view()).unwrap();
        for i in 0..dim {
            assert_abs_diff_eq!(sol[i], rhs[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_regularisation_shifts_diagonal() {
        // (I + I) x = b  =>  x = b / 2
        let matrix = Array2::<f64>::eye(3);
        let rhs = array![2.0, -4.0, 1.0];
        let sol = solve_regularised(matrix.view(), 1.0, rhs.view()).unwrap();
        assert_abs_diff_eq!(sol[0], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(sol[1], -2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(sol[2], 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_solve_symmetric_system() {
        let matrix = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
        let rhs = array![1.0, 2.0, 3.0];

        let sol = solve_regularised(matrix.view(), 0.0, rhs.view()).unwrap();

        let check = matrix.dot(&sol);
        for i in 0..3 {
            assert!(
                (check[i] - rhs[i]).abs() < 1e-12,
                "Mismatch at {}: got {}, expected {}",
                i,
                check[i],
                rhs[i]
            );
        }
    }

    #[test]
    fn test_duplicate_rows_are_singular() {
        let matrix = array![[2.0, 2.0, 1.0], [2.0, 2.0, 1.0], [1.0, 1.0, 3.0]];
        let rhs = array![1.0, 1.0, 1.0];

        let err = solve_regularised(matrix.view(), 0.0, rhs.view()).unwrap_err();
        assert!(matches!(err, KcsdError::SingularMatrix { dim: 3, .. }));

        // Any positive lambda restores invertibility.
        assert!(solve_regularised(matrix.view(), 1e-3, rhs.view()).is_ok());
    }

    #[test]
    fn test_zero_matrix_is_singular() {
        let matrix = Array2::<f64>::zeros((2, 2));
        let rhs = array![1.0, 1.0];
        assert!(matches!(
            solve_regularised(matrix.view(), 0.0, rhs.view()),
            Err(KcsdError::SingularMatrix { pivot_ratio, .. }) if pivot_ratio == 0.0
        ));
    }

    #[test]
    fn test_negative_lambda_rejected() {
        let matrix = Array2::<f64>::eye(2);
        let rhs = array![1.0, 1.0];
        assert!(matches!(
            solve_regularised(matrix.view(), -1.0, rhs.view()),
            Err(KcsdError::Configuration(_))
        ));
        assert!(solve_regularised(matrix.view(), f64::NAN, rhs.view()).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let matrix = Array2::<f64>::eye(3);
        let rhs = array![1.0, 1.0];
        assert!(solve_regularised(matrix.view(), 0.0, rhs.view()).is_err());
    }
}
