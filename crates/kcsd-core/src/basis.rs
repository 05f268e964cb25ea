//! Basis-source density shapes.
//!
//! Each basis source is a compactly supported density centred on a lattice
//! point with support radius $R$. All shapes peak at 1 at the centre:
//!
//! | Shape | Density at distance $r$ |
//! |-------|-------------------------|
//! | `step` | $1$ for $r \le R$, else $0$ |
//! | `gaussian` | $\exp(-r^2 / 2s^2)$ with $s = R/3$ |
//! | `gaussian-limited` | gaussian, truncated to $r \le R$ |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KcsdError;

/// The family of basis functions used to expand the unknown CSD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BasisShape {
    /// Uniform ball of radius R.
    Step,
    /// Gaussian with three standard deviations equal to R.
    ///
    /// The density keeps its tail beyond R, so the estimated CSD does too,
    /// but the distance table integrates the potential over the ball of
    /// radius R only. The tail (about 3% of the source mass) therefore
    /// carries CSD without contributing potential. Use
    /// [`BasisShape::GaussianLimited`] for a source whose CSD and potential
    /// share the same support.
    #[default]
    #[serde(alias = "gauss")]
    Gaussian,
    /// Gaussian truncated at R.
    #[serde(alias = "gauss_lim", alias = "gaussian_limited")]
    GaussianLimited,
}

impl BasisShape {
    /// Every available shape, in documentation order.
    pub const ALL: [BasisShape; 3] = [
        BasisShape::Step,
        BasisShape::Gaussian,
        BasisShape::GaussianLimited,
    ];

    /// Canonical configuration name.
    pub fn name(self) -> &'static str {
        match self {
            BasisShape::Step => "step",
            BasisShape::Gaussian => "gaussian",
            BasisShape::GaussianLimited => "gaussian-limited",
        }
    }

    /// Density at distance `r` from the centre of a source of radius `radius`.
    #[inline]
    pub fn radial(self, r: f64, radius: f64) -> f64 {
        match self {
            BasisShape::Step => {
                if r <= radius {
                    1.0
                } else {
                    0.0
                }
            }
            BasisShape::Gaussian => gaussian(r, radius),
            BasisShape::GaussianLimited => {
                if r <= radius {
                    gaussian(r, radius)
                } else {
                    0.0
                }
            }
        }
    }

    /// Density of the source centred at `centre` evaluated at `point`.
    #[inline]
    pub fn density(self, centre: &[f64; 3], radius: f64, point: &[f64; 3]) -> f64 {
        self.radial(kcsd_geometry::distance(centre, point), radius)
    }
}

#[inline]
fn gaussian(r: f64, radius: f64) -> f64 {
    let s = radius / 3.0;
    (-(r * r) / (2.0 * s * s)).exp()
}

impl fmt::Display for BasisShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BasisShape {
    type Err = KcsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "step" => Ok(BasisShape::Step),
            "gaussian" | "gauss" => Ok(BasisShape::Gaussian),
            "gaussian-limited" | "gaussian_limited" | "gauss_lim" => {
                Ok(BasisShape::GaussianLimited)
            }
            other => Err(KcsdError::Configuration(format!(
                "Unknown basis shape '{}'. Valid shapes: step, gaussian, gaussian-limited",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_all_shapes_peak_at_one() {
        for shape in BasisShape::ALL {
            assert_eq!(shape.radial(0.0, 2.0), 1.0, "{shape}");
        }
    }

    #[test]
    fn test_compact_support() {
        let r = 1.5;
        assert_eq!(BasisShape::Step.radial(1.5, r), 1.0);
        assert_eq!(BasisShape::Step.radial(1.5001, r), 0.0);
        assert_eq!(BasisShape::GaussianLimited.radial(1.6, r), 0.0);
        // The plain gaussian keeps its tail beyond R.
        assert!(BasisShape::Gaussian.radial(1.6, r) > 0.0);
    }

    #[test]
    fn test_gaussian_three_sigma() {
        // At r = R the gaussian sits three standard deviations out.
        assert_relative_eq!(
            BasisShape::Gaussian.radial(3.0, 3.0),
            (-4.5_f64).exp(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_density_uses_euclidean_distance() {
        let centre = [1.0, 2.0, 3.0];
        let point = [1.0, 2.0, 4.0];
        assert_eq!(
            BasisShape::Gaussian.density(&centre, 3.0, &point),
            BasisShape::Gaussian.radial(1.0, 3.0)
        );
    }

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("step".parse::<BasisShape>().unwrap(), BasisShape::Step);
        assert_eq!("gauss".parse::<BasisShape>().unwrap(), BasisShape::Gaussian);
        assert_eq!(
            "gauss_lim".parse::<BasisShape>().unwrap(),
            BasisShape::GaussianLimited
        );
        for shape in BasisShape::ALL {
            assert_eq!(shape.name().parse::<BasisShape>().unwrap(), shape);
        }
    }

    #[test]
    fn test_unknown_shape_rejected() {
        assert!(matches!(
            "cosine".parse::<BasisShape>(),
            Err(KcsdError::Configuration(_))
        ));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BasisShape::GaussianLimited).unwrap();
        assert_eq!(json, "\"gaussian-limited\"");
        let parsed: BasisShape = serde_json::from_str("\"gauss\"").unwrap();
        assert_eq!(parsed, BasisShape::Gaussian);
        assert!(serde_json::from_str::<BasisShape>("\"wavelet\"").is_err());
    }
}
