//! Resampling of probed potentials onto the uniform table indices.
//!
//! The potential is integrated at irregular probe coordinates, dense around
//! the support boundary and sparse far away. A natural cubic spline through
//! the probes is evaluated at every integer table index.

use std::cmp::Ordering;

use crate::error::KcsdError;

/// Natural cubic spline through probed table values.
///
/// Stores the knot coordinates, the probed values and the second derivative
/// of the interpolant at every knot. The second derivative vanishes at the
/// first and last knot.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    curvature: Vec<f64>,
}

impl CubicSpline {
    /// Fit the spline through `(knots[i], values[i])`.
    ///
    /// # Errors
    /// Returns [`KcsdError::Configuration`] for mismatched lengths, fewer than
    /// two knots, or knots that are not strictly increasing.
    pub fn new(knots: Vec<f64>, values: Vec<f64>) -> Result<Self, KcsdError> {
        if knots.len() != values.len() {
            return Err(KcsdError::Configuration(format!(
                "Spline has {} knots but {} values",
                knots.len(),
                values.len()
            )));
        }
        if knots.len() < 2 {
            return Err(KcsdError::Configuration("Spline needs at least 2 knots".into()));
        }
        if let Some(i) = knots
            .windows(2)
            .position(|w| w[0].partial_cmp(&w[1]) != Some(Ordering::Less))
        {
            return Err(KcsdError::Configuration(format!(
                "Spline knots must increase strictly, knot {} is {} after {}",
                i + 1,
                knots[i + 1],
                knots[i]
            )));
        }

        let curvature = natural_curvature(&knots, &values);
        Ok(Self {
            knots,
            values,
            curvature,
        })
    }

    /// Interpolated value at table coordinate `x`; zero outside the knots.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.knots.len();
        if !(x >= self.knots[0] && x <= self.knots[n - 1]) {
            return 0.0;
        }

        let hi = self.knots.partition_point(|&k| k <= x).clamp(1, n - 1);
        let lo = hi - 1;
        let width = self.knots[hi] - self.knots[lo];
        let a = (self.knots[hi] - x) / width;
        let b = 1.0 - a;

        let linear = a * self.values[lo] + b * self.values[hi];
        let bend = (a * a * a - a) * self.curvature[lo] + (b * b * b - b) * self.curvature[hi];
        linear + bend * width * width / 6.0
    }
}

/// Second derivatives at the knots from the tridiagonal continuity system,
/// solved with the Thomas algorithm. End values are fixed at zero.
fn natural_curvature(knots: &[f64], values: &[f64]) -> Vec<f64> {
    let n = knots.len();
    let mut curvature = vec![0.0_f64; n];
    if n < 3 {
        return curvature;
    }

    let widths: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();
    let interior = n - 2;
    let mut upper = vec![0.0_f64; interior];
    let mut rhs = vec![0.0_f64; interior];

    for k in 0..interior {
        let (left, right) = (widths[k], widths[k + 1]);
        let slope_jump =
            (values[k + 2] - values[k + 1]) / right - (values[k + 1] - values[k]) / left;
        let (prev_upper, prev_rhs) = if k == 0 {
            (0.0, 0.0)
        } else {
            (upper[k - 1], rhs[k - 1])
        };
        let pivot = 2.0 * (left + right) - left * prev_upper;
        upper[k] = right / pivot;
        rhs[k] = (6.0 * slope_jump - left * prev_rhs) / pivot;
    }

    for k in (0..interior).rev() {
        curvature[k + 1] = rhs[k] - upper[k] * curvature[k + 2];
    }
    curvature
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hits_every_probe() {
        // Irregular knots on a point-source-like decay.
        let knots = vec![0.0, 0.5, 1.7, 4.0, 9.0, 20.0];
        let values: Vec<f64> = knots.iter().map(|x| 1.0 / (1.0 + x)).collect();
        let spline = CubicSpline::new(knots.clone(), values.clone()).unwrap();
        for (x, v) in knots.iter().zip(&values) {
            assert_relative_eq!(spline.evaluate(*x), *v, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_straight_line_has_no_curvature() {
        let knots = vec![0.0, 0.5, 2.0, 2.5, 7.0];
        let values: Vec<f64> = knots.iter().map(|x| 3.0 * x - 1.0).collect();
        let spline = CubicSpline::new(knots, values).unwrap();
        assert!(spline.curvature.iter().all(|c| c.abs() < 1e-12));
        for x in [0.1, 1.3, 4.4, 6.9] {
            assert_relative_eq!(spline.evaluate(x), 3.0 * x - 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_smooth_between_probes() {
        let knots: Vec<f64> = (0..=20).map(|i| i as f64 * 0.5).collect();
        let values: Vec<f64> = knots.iter().map(|x| (-0.3 * x).exp()).collect();
        let spline = CubicSpline::new(knots, values).unwrap();
        for x in [2.25, 3.75, 6.1] {
            assert_relative_eq!(spline.evaluate(x), (-0.3 * x).exp(), max_relative = 1e-3);
        }
    }

    #[test]
    fn test_zero_outside_knots() {
        let spline = CubicSpline::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(spline.evaluate(-0.1), 0.0);
        assert_eq!(spline.evaluate(2.1), 0.0);
        assert_eq!(spline.evaluate(f64::NAN), 0.0);
    }

    #[test]
    fn test_bad_knots_rejected() {
        assert!(CubicSpline::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(CubicSpline::new(vec![0.0], vec![1.0]).is_err());
        assert!(CubicSpline::new(vec![0.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]).is_err());
    }
}
