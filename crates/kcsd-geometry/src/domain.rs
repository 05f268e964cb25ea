//! Axis-aligned estimation domains.
//!
//! A [`Domain`] is the box in which the CSD is estimated. By default it is
//! the bounding box of the electrode positions; any of the six bounds may be
//! overridden. Basis sources are spread over the domain grown by a per-axis
//! extension margin, so that sources just outside the electrode array can
//! still explain the measured potentials.

use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// Relative tolerance below which an axis extent is treated as zero.
const COLLAPSE_TOLERANCE: f64 = 1e-12;

/// An axis-aligned box with extension margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Lower corner (x, y, z).
    pub min: [f64; 3],
    /// Upper corner (x, y, z).
    pub max: [f64; 3],
    /// Extension margin added on both sides of each axis for source placement.
    pub extension: [f64; 3],
}

/// Optional per-bound overrides of an electrode-derived domain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundOverrides {
    pub min: [Option<f64>; 3],
    pub max: [Option<f64>; 3],
}

impl Domain {
    /// Create a domain from explicit bounds.
    ///
    /// Every bound must be finite, `max >= min` on each axis and every
    /// extension must be finite and non-negative.
    pub fn new(min: [f64; 3], max: [f64; 3], extension: [f64; 3]) -> Result<Self, GeometryError> {
        for axis in 0..3 {
            let name = axis_name(axis);
            if !min[axis].is_finite() || !max[axis].is_finite() {
                return Err(GeometryError::InvalidParameter(format!(
                    "{name} bounds must be finite, got [{}, {}]",
                    min[axis], max[axis]
                )));
            }
            if max[axis] < min[axis] {
                return Err(GeometryError::DegenerateDomain(format!(
                    "{name}_max ({}) is smaller than {name}_min ({})",
                    max[axis], min[axis]
                )));
            }
            if !extension[axis].is_finite() || extension[axis] < 0.0 {
                return Err(GeometryError::InvalidParameter(format!(
                    "{name} extension must be finite and non-negative, got {}",
                    extension[axis]
                )));
            }
        }
        Ok(Self { min, max, extension })
    }

    /// Bounding box of a set of positions, with optional bound overrides.
    pub fn from_positions(
        positions: &[[f64; 3]],
        overrides: &BoundOverrides,
        extension: [f64; 3],
    ) -> Result<Self, GeometryError> {
        if positions.is_empty() {
            return Err(GeometryError::InvalidParameter(
                "Cannot derive a domain from zero positions".into(),
            ));
        }
        let (lo, hi) = bounding_box(positions);
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = overrides.min[axis].unwrap_or(lo[axis]);
            max[axis] = overrides.max[axis].unwrap_or(hi[axis]);
        }
        Self::new(min, max, extension)
    }

    /// Side length along `axis` (without extension).
    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Side length along `axis` including the extension on both sides.
    pub fn extended_extent(&self, axis: usize) -> f64 {
        self.extent(axis) + 2.0 * self.extension[axis]
    }

    /// Midpoint of the domain along `axis`.
    pub fn centre(&self, axis: usize) -> f64 {
        0.5 * (self.min[axis] + self.max[axis])
    }

    /// Whether the extended domain has zero thickness along `axis`.
    pub fn is_collapsed(&self, axis: usize) -> bool {
        let scale = self.min[axis].abs().max(self.max[axis].abs()).max(1.0);
        self.extended_extent(axis) <= COLLAPSE_TOLERANCE * scale
    }

    /// Axes along which the extended domain has non-zero thickness.
    pub fn active_axes(&self) -> Vec<usize> {
        (0..3).filter(|&axis| !self.is_collapsed(axis)).collect()
    }
}

/// Lower and upper corners of the box enclosing `points`.
///
/// Returns infinities for an empty slice.
pub fn bounding_box(points: &[[f64; 3]]) -> ([f64; 3], [f64; 3]) {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for p in points {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(p[axis]);
            hi[axis] = hi[axis].max(p[axis]);
        }
    }
    (lo, hi)
}

pub(crate) fn axis_name(axis: usize) -> &'static str {
    match axis {
        0 => "x",
        1 => "y",
        _ => "z",
    }
}
