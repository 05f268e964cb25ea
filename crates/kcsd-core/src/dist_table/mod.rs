//! Distance-indexed potential of a single basis source.
//!
//! Every basis source has the same shape and radius, so the potential it
//! generates depends only on the distance to the observation point:
//!
//! $$
//! V(d) = \frac{1}{4\pi\sigma} \int_{|\mathbf{p}| \le R}
//! \frac{\rho(\mathbf{p})}{|\mathbf{p} - \mathbf{x}|} \, d^3\mathbf{p},
//! \qquad |\mathbf{x}| = d
//! $$
//!
//! The table stores $V$ at `density` uniformly spaced distances covering
//! `[0, dist_max)`. It is built once per model by integrating at irregular
//! probe distances and resampling through a natural cubic spline.
//!
//! # Integration
//!
//! The volume integral is evaluated in spherical coordinates centred on the
//! observation point, where the $s^2$ Jacobian cancels the $1/s$ kernel:
//! $\int \rho(\mathbf{x} + s\hat\omega)\, s \, ds \, d\Omega$. Each ray is
//! integrated along its chord through the support ball, and when the
//! observation point lies outside the ball only the cone of rays that hits
//! it is sampled. The integrand is therefore bounded everywhere and the
//! support boundary never falls inside a quadrature panel.

pub mod quadrature;
pub mod spline;

use std::f64::consts::PI;

use kcsd_compute::ComputeBackend;
use log::debug;

use crate::basis::BasisShape;
use crate::error::KcsdError;
use quadrature::GaussLegendre;
use spline::CubicSpline;

/// Number of table entries used by [`crate::solver::Kcsd3d`].
pub const DIST_TABLE_DENSITY: usize = 100;

/// Smallest distance at which the potential is integrated.
pub const FLOOR_DISTANCE: f64 = 1e-5;

const RADIAL_NODES: usize = 32;
const POLAR_NODES: usize = 48;
const AZIMUTHAL_NODES: usize = 8;

/// Probe spacing (in table index units) inside, around and beyond the support radius.
const DENSE_STEP: f64 = 3.0;
const BOUNDARY_STEP: f64 = 1.0;
const SPARSE_STEP: f64 = 9.0;

/// Lookup table of one basis source's potential as a function of distance.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTable {
    values: Vec<f64>,
    dist_max: f64,
}

impl DistanceTable {
    /// Build the table for sources of the given shape and radius.
    ///
    /// # Arguments
    /// * `radius` - Support radius $R$ shared by all sources.
    /// * `dist_max` - Largest distance that will be looked up.
    /// * `density` - Number of table entries (at least 2).
    /// * `shape` - Basis density.
    /// * `sigma` - Conductivity of the medium.
    /// * `backend` - Schedules the probe integrals.
    pub fn build(
        radius: f64,
        dist_max: f64,
        density: usize,
        shape: BasisShape,
        sigma: f64,
        backend: &dyn ComputeBackend,
    ) -> Result<Self, KcsdError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(KcsdError::Configuration(format!(
                "Source radius must be positive, got {radius}"
            )));
        }
        if !(dist_max.is_finite() && dist_max > 0.0) {
            return Err(KcsdError::Configuration(format!(
                "dist_max must be positive, got {dist_max}"
            )));
        }
        if density < 2 {
            return Err(KcsdError::Configuration(format!(
                "Distance table needs at least 2 entries, got {density}"
            )));
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(KcsdError::Configuration(format!(
                "Conductivity must be positive, got {sigma}"
            )));
        }

        let xs = probe_points(radius, dist_max, density);
        let integrator = SourcePotential::new();
        let to_distance = dist_max / density as f64;

        // One probe per row.
        let raw = backend.parallel_matrix_fill(xs.len(), 1, &|i, _| {
            integrator.integrate(shape, radius, xs[i] * to_distance)
        })?;

        // Point-source kernel 1/(4 pi sigma), applied once for the whole table.
        let scale = 1.0 / (4.0 * PI * sigma);
        let mut probed = Vec::with_capacity(raw.len());
        for (&x, &value) in xs.iter().zip(raw.iter()) {
            let scaled = value * scale;
            if !scaled.is_finite() {
                return Err(KcsdError::NumericalIntegration {
                    distance: x * to_distance,
                    value: scaled,
                });
            }
            probed.push(scaled);
        }

        let spline = CubicSpline::new(xs, probed)?;
        let mut values = Vec::with_capacity(density);
        for i in 0..density {
            let value = spline.evaluate(i as f64);
            if !value.is_finite() {
                return Err(KcsdError::NumericalIntegration {
                    distance: i as f64 * to_distance,
                    value,
                });
            }
            values.push(value);
        }

        debug!(
            "Distance table: {} entries over [0, {:.4e}], R={:.4e}, shape={}, V(0)={:.4e}",
            density, dist_max, radius, shape, values[0]
        );

        Ok(Self { values, dist_max })
    }

    /// Potential generated at distance `distance` from a unit-strength source.
    ///
    /// Nearest-entry lookup; distances beyond the table map to the last entry.
    #[inline]
    pub fn lookup(&self, distance: f64) -> f64 {
        let n = self.values.len();
        let index = (n as f64 * distance / self.dist_max).round();
        let index = if index.is_nan() || index <= 0.0 {
            0
        } else {
            (index as usize).min(n - 1)
        };
        self.values[index]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn density(&self) -> usize {
        self.values.len()
    }

    pub fn dist_max(&self) -> f64 {
        self.dist_max
    }

    /// Physical distance represented by entry `index`.
    pub fn distance_at(&self, index: usize) -> f64 {
        index as f64 / self.values.len() as f64 * self.dist_max
    }
}

/// Table coordinates (in `[0, density]`) at which the potential is integrated.
///
/// Log-spaced points are merged with regular steps that are densest between
/// `0.9 R` and `1.3 R`, where the potential changes from the interior to the
/// exterior regime.
pub fn probe_points(radius: f64, dist_max: f64, density: usize) -> Vec<f64> {
    let n = density as f64;
    let top = (n + 1.0).log10();
    let last = (density - 1).max(1) as f64;

    let mut xs: Vec<f64> = (0..density)
        .map(|i| 10f64.powf(top * i as f64 / last) - 1.0)
        .collect();

    let border_inner = (0.9 * radius / dist_max * n).min(n);
    let border_outer = (1.3 * radius / dist_max * n).min(n);
    push_steps(&mut xs, 0.0, border_inner, DENSE_STEP);
    push_steps(&mut xs, border_inner, border_outer, BOUNDARY_STEP);
    push_steps(&mut xs, border_outer, n, SPARSE_STEP);
    xs.push(0.0);
    xs.push(n);

    for x in xs.iter_mut() {
        *x = x.clamp(0.0, n);
    }
    xs.sort_by(|a, b| a.total_cmp(b));
    xs.dedup_by(|later, kept| (*later - *kept).abs() < 1e-9);
    if let Some(end) = xs.last_mut() {
        *end = n;
    }
    xs
}

fn push_steps(xs: &mut Vec<f64>, start: f64, end: f64, step: f64) {
    let mut k = 0usize;
    loop {
        let x = start + k as f64 * step;
        if x >= end {
            break;
        }
        xs.push(x);
        k += 1;
    }
}

/// Quadrature for the potential of one basis source centred at the origin.
#[derive(Debug, Clone)]
pub struct SourcePotential {
    radial: GaussLegendre,
    polar: GaussLegendre,
    azimuthal: usize,
}

impl Default for SourcePotential {
    fn default() -> Self {
        Self::new()
    }
}

impl SourcePotential {
    pub fn new() -> Self {
        Self {
            radial: GaussLegendre::new(RADIAL_NODES),
            polar: GaussLegendre::new(POLAR_NODES),
            azimuthal: AZIMUTHAL_NODES,
        }
    }

    /// $\int_{|\mathbf{p}| \le R} \rho(\mathbf{p}) / |\mathbf{p} - \mathbf{x}| \, d^3\mathbf{p}$
    /// for $\mathbf{x} = (d, 0, 0)$, without the $1/(4\pi\sigma)$ factor.
    pub fn integrate(&self, shape: BasisShape, radius: f64, distance: f64) -> f64 {
        let d = distance.max(FLOOR_DISTANCE);
        let centre = [0.0; 3];
        let r_sq = radius * radius;

        // Polar angle is measured from the direction pointing at the source centre.
        let theta_max = if d < radius { PI } else { (radius / d).asin() };
        let d_phi = 2.0 * PI / self.azimuthal as f64;

        let mut total = 0.0;
        for k in 0..self.azimuthal {
            let phi = (k as f64 + 0.5) * d_phi;
            let (sin_phi, cos_phi) = phi.sin_cos();

            for (theta, w_theta) in self.polar.mapped(0.0, theta_max) {
                let (sin_t, cos_t) = theta.sin_cos();
                let disc = r_sq - d * d * sin_t * sin_t;
                if disc <= 0.0 {
                    continue;
                }
                let half_chord = disc.sqrt();
                let s_hi = d * cos_t + half_chord;
                let s_lo = (d * cos_t - half_chord).max(0.0);
                if s_hi <= s_lo {
                    continue;
                }

                let dir = [-cos_t, sin_t * cos_phi, sin_t * sin_phi];
                let ray: f64 = self
                    .radial
                    .mapped(s_lo, s_hi)
                    .map(|(s, w_s)| {
                        let p = [d + s * dir[0], s * dir[1], s * dir[2]];
                        w_s * shape.density(&centre, radius, &p) * s
                    })
                    .sum();
                total += w_theta * sin_t * ray;
            }
        }

        total * d_phi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kcsd_compute::{CpuBackend, SerialBackend};

    fn serial_table(
        radius: f64,
        dist_max: f64,
        density: usize,
        shape: BasisShape,
        sigma: f64,
    ) -> Result<DistanceTable, KcsdError> {
        DistanceTable::build(radius, dist_max, density, shape, sigma, &SerialBackend)
    }

    #[test]
    fn test_step_potential_at_centre() {
        // Uniform ball: integral of 1/|p| is 2 pi R^2
        let r = 1.3;
        let value = SourcePotential::new().integrate(BasisShape::Step, r, 0.0);
        assert_relative_eq!(value, 2.0 * PI * r * r, max_relative = 1e-6);
    }

    #[test]
    fn test_step_potential_far_field() {
        // Outside a uniform ball the potential is that of a point charge.
        let r = 1.0;
        let d = 2.0;
        let value = SourcePotential::new().integrate(BasisShape::Step, r, d);
        let volume = 4.0 / 3.0 * PI * r.powi(3);
        assert_relative_eq!(value, volume / d, max_relative = 1e-3);
    }

    #[test]
    fn test_step_potential_inside_ball() {
        // Inside: 2 pi (R^2 - d^2 / 3)
        let r = 1.0;
        let d = 0.5;
        let value = SourcePotential::new().integrate(BasisShape::Step, r, d);
        assert_relative_eq!(value, 2.0 * PI * (r * r - d * d / 3.0), max_relative = 1e-6);
    }

    #[test]
    fn test_gaussian_potential_at_centre() {
        // 4 pi s^2 (1 - exp(-R^2 / 2 s^2)) with s = R / 3
        let r = 1.5;
        let s = r / 3.0;
        let value = SourcePotential::new().integrate(BasisShape::Gaussian, r, 0.0);
        let expected = 4.0 * PI * s * s * (1.0 - (-4.5_f64).exp());
        assert_relative_eq!(value, expected, max_relative = 1e-6);
    }

    #[test]
    fn test_probe_points_cover_table() {
        let xs = probe_points(1.0, 4.0, 100);
        assert_eq!(xs[0], 0.0);
        assert_eq!(*xs.last().unwrap(), 100.0);
        assert!(xs.windows(2).all(|w| w[1] > w[0]));
        // 0.9 R .. 1.3 R maps to 22.5 .. 32.5: unit steps there
        assert!(xs.iter().any(|&x| (x - 23.5).abs() < 1e-9));
    }

    #[test]
    fn test_table_is_finite_and_peaks_at_zero() {
        for shape in BasisShape::ALL {
            let table = serial_table(5.0 / 3.0, 4.62, 100, shape, 1.0).unwrap();
            assert_eq!(table.density(), 100);
            assert!(table.values().iter().all(|v| v.is_finite()), "{shape}");
            let peak = table.values()[0];
            assert!(
                table.values().iter().all(|&v| v <= peak),
                "{shape}: table maximum is not at distance zero"
            );
        }
    }

    #[test]
    fn test_table_far_field_matches_point_source() {
        let r = 1.0;
        let sigma = 0.3;
        let table = serial_table(r, 10.0, 100, BasisShape::Step, sigma).unwrap();
        // Entry 50 sits at d = 5 R: V = R^3 / (3 sigma d)
        let d = table.distance_at(50);
        assert_relative_eq!(
            table.values()[50],
            r.powi(3) / (3.0 * sigma * d),
            max_relative = 1e-3
        );
    }

    #[test]
    fn test_conductivity_scales_table() {
        let a = serial_table(1.0, 5.0, 50, BasisShape::Gaussian, 1.0).unwrap();
        let b = serial_table(1.0, 5.0, 50, BasisShape::Gaussian, 2.0).unwrap();
        for (va, vb) in a.values().iter().zip(b.values()) {
            assert_relative_eq!(*va, 2.0 * vb, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_gaussian_tail_adds_no_potential() {
        // Only the ball of radius R is integrated, where both gaussians agree.
        let full = serial_table(1.0, 4.0, 100, BasisShape::Gaussian, 1.0).unwrap();
        let cut = serial_table(1.0, 4.0, 100, BasisShape::GaussianLimited, 1.0).unwrap();
        for (a, b) in full.values().iter().zip(cut.values()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_table_identical_on_every_backend() {
        let serial = serial_table(0.4, 3.0, 100, BasisShape::Gaussian, 0.3).unwrap();
        let pooled = CpuBackend::with_threads(3).unwrap();
        let parallel =
            DistanceTable::build(0.4, 3.0, 100, BasisShape::Gaussian, 0.3, &pooled).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_lookup_rounds_and_clamps() {
        let table = DistanceTable {
            values: vec![4.0, 3.0, 2.0, 1.0],
            dist_max: 4.0,
        };
        assert_eq!(table.lookup(0.0), 4.0);
        assert_eq!(table.lookup(0.6), 3.0);
        assert_eq!(table.lookup(2.4), 2.0);
        assert_eq!(table.lookup(100.0), 1.0);
        assert_eq!(table.lookup(-1.0), 4.0);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(serial_table(0.0, 1.0, 100, BasisShape::Step, 1.0).is_err());
        assert!(serial_table(1.0, 1.0, 1, BasisShape::Step, 1.0).is_err());
        assert!(serial_table(1.0, 1.0, 100, BasisShape::Step, -1.0).is_err());
    }
}
