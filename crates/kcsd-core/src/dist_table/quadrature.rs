//! Gauss–Legendre quadrature rules.
//!
//! Nodes are the roots of the Legendre polynomial $P_n$ on $[-1, 1]$, found
//! by Newton iteration from the Chebyshev-like initial guess
//! $\cos(\pi (i + 3/4) / (n + 1/2))$. An $n$-point rule integrates
//! polynomials up to degree $2n - 1$ exactly.

use std::f64::consts::PI;

/// An `n`-point Gauss–Legendre rule on the reference interval `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Compute the `n`-point rule.
    ///
    /// # Panics
    /// Panics if `n == 0`.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "Quadrature rule needs at least one node");

        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let nf = n as f64;

        for i in 0..(n + 1) / 2 {
            let mut z = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
            let mut dp = 1.0;
            for _ in 0..100 {
                // Three-term recurrence for P_n(z) and P_{n-1}(z)
                let mut p1 = 1.0;
                let mut p2 = 0.0;
                for j in 0..n {
                    let p3 = p2;
                    p2 = p1;
                    let jf = j as f64;
                    p1 = ((2.0 * jf + 1.0) * z * p2 - jf * p3) / (jf + 1.0);
                }
                dp = nf * (z * p1 - p2) / (z * z - 1.0);
                let previous = z;
                z = previous - p1 / dp;
                if (z - previous).abs() < 1e-15 {
                    break;
                }
            }
            let w = 2.0 / ((1.0 - z * z) * dp * dp);
            nodes[i] = -z;
            nodes[n - 1 - i] = z;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }

        Self { nodes, weights }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes and weights mapped onto `[a, b]`.
    pub fn mapped(&self, a: f64, b: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .map(move |(&x, &w)| (mid + half * x, half * w))
    }

    /// Integrate `f` over `[a, b]`.
    pub fn integrate<F: Fn(f64) -> f64>(&self, a: f64, b: f64, f: F) -> f64 {
        self.mapped(a, b).map(|(x, w)| w * f(x)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_weights_sum_to_interval_length() {
        for n in [1, 2, 3, 8, 32, 48] {
            let rule = GaussLegendre::new(n);
            let total: f64 = rule.integrate(-1.0, 1.0, |_| 1.0);
            assert_abs_diff_eq!(total, 2.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_three_point_rule_matches_closed_form() {
        let rule = GaussLegendre::new(3);
        let expected = (3.0_f64 / 5.0).sqrt();
        assert_abs_diff_eq!(rule.nodes[0], -expected, epsilon = 1e-14);
        assert_abs_diff_eq!(rule.nodes[1], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(rule.weights[1], 8.0 / 9.0, epsilon = 1e-14);
    }

    #[test]
    fn test_exact_for_odd_degree_polynomials() {
        // 5 points are exact up to degree 9
        let rule = GaussLegendre::new(5);
        let integral = rule.integrate(0.0, 2.0, |x| x.powi(9));
        assert_abs_diff_eq!(integral, 2.0_f64.powi(10) / 10.0, epsilon = 1e-10);
    }

    #[test]
    fn test_smooth_integrand() {
        let rule = GaussLegendre::new(24);
        let integral = rule.integrate(0.0, PI, f64::sin);
        assert_abs_diff_eq!(integral, 2.0, epsilon = 1e-13);
    }
}
