//! Placement of basis sources on a regular lattice.
//!
//! Basis sources tile the extended domain on a lattice with a common spacing
//! `ds`. The lattice resolution is chosen so that the number of sources is
//! close to the requested count: with `k` non-collapsed axes of extended
//! lengths $L_a$, the unit cell edge is $(\prod_a L_a / n)^{1/k}$ and each
//! axis receives $\lceil L_a / \text{unit} \rceil$ layers. The support radius
//! is the initial guess rounded to a whole number of lattice steps, so every
//! source overlaps the same number of neighbours.

use log::debug;

use crate::domain::{bounding_box, Domain};
use crate::{linspace, GeometryError};

/// Slack used when rounding layer counts up, so that exact ratios such as
/// `1.0 / 0.25` do not gain an extra layer from floating-point noise.
const CEIL_SLACK: f64 = 1e-9;

/// Basis-source centres together with their shared support radius.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    /// Source centres in row-major order over the lattice `(ix, iy, iz)`.
    centres: Vec<[f64; 3]>,
    /// Number of lattice layers along each axis.
    shape: [usize; 3],
    /// Lattice step shared by all non-collapsed axes.
    spacing: f64,
    /// Support radius shared by every source.
    radius: f64,
}

impl SourceSet {
    pub fn centres(&self) -> &[[f64; 3]] {
        &self.centres
    }

    pub fn len(&self) -> usize {
        self.centres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Lower and upper corners of the source lattice.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        bounding_box(&self.centres)
    }

    /// Longest distance at which a source can influence an observation point.
    ///
    /// This is the diagonal of the cuboid enclosing all sources and the
    /// observation box `[obs_min, obs_max]`, with every side lengthened by the
    /// support radius. All source-to-observation distances are below it.
    pub fn dist_max(&self, obs_min: [f64; 3], obs_max: [f64; 3]) -> f64 {
        let (lo, hi) = self.bounds();
        let mut sum_sq = 0.0;
        for axis in 0..3 {
            let side = hi[axis].max(obs_max[axis]) - lo[axis].min(obs_min[axis]) + self.radius;
            sum_sq += side * side;
        }
        sum_sq.sqrt()
    }
}

/// Lay out approximately `n_sources` basis sources over the extended domain.
///
/// # Arguments
/// * `domain` - Estimation domain with its extension margins.
/// * `n_sources` - Requested number of sources (the result may differ).
/// * `r_init` - Initial guess of the support radius.
///
/// # Errors
/// Returns [`GeometryError`] if `n_sources` is zero, `r_init` is not a
/// positive finite number, or the domain is collapsed along two or more axes
/// while more than one source is requested.
pub fn layout_sources(
    domain: &Domain,
    n_sources: usize,
    r_init: f64,
) -> Result<SourceSet, GeometryError> {
    if n_sources == 0 {
        return Err(GeometryError::InvalidParameter(
            "number of sources must be at least 1".into(),
        ));
    }
    if !r_init.is_finite() || r_init <= 0.0 {
        return Err(GeometryError::InvalidParameter(format!(
            "initial source radius must be positive, got {r_init}"
        )));
    }

    let active = domain.active_axes();
    if n_sources == 1 {
        let centre = [domain.centre(0), domain.centre(1), domain.centre(2)];
        return Ok(SourceSet {
            centres: vec![centre],
            shape: [1, 1, 1],
            spacing: r_init,
            radius: r_init,
        });
    }
    if active.len() < 2 {
        return Err(GeometryError::DegenerateDomain(format!(
            "{} sources requested but the extended domain only spans {} axis(es); \
             at most one axis may collapse",
            n_sources,
            active.len()
        )));
    }

    let measure: f64 = active.iter().map(|&a| domain.extended_extent(a)).product();
    let unit = (measure / n_sources as f64).powf(1.0 / active.len() as f64);

    let mut shape = [1usize; 3];
    for &axis in &active {
        let layers = (domain.extended_extent(axis) / unit - CEIL_SLACK).ceil() as usize;
        shape[axis] = layers.max(2);
    }

    let first = active[0];
    let spacing = domain.extended_extent(first) / (shape[first] - 1) as f64;

    let mut coords: [Vec<f64>; 3] = Default::default();
    for axis in 0..3 {
        coords[axis] = if shape[axis] == 1 {
            vec![domain.centre(axis)]
        } else {
            let half_span = 0.5 * (shape[axis] - 1) as f64 * spacing;
            let centre = domain.centre(axis);
            linspace(centre - half_span, centre + half_span, shape[axis])
        };
    }

    let mut centres = Vec::with_capacity(shape.iter().product());
    for &x in &coords[0] {
        for &y in &coords[1] {
            for &z in &coords[2] {
                centres.push([x, y, z]);
            }
        }
    }

    let steps = (r_init / spacing).round().max(1.0);
    let radius = steps * spacing;

    debug!(
        "Source lattice {}x{}x{} ({} sources, requested {}), ds={:.4e}, R={:.4e}",
        shape[0],
        shape[1],
        shape[2],
        centres.len(),
        n_sources,
        spacing,
        radius
    );

    Ok(SourceSet {
        centres,
        shape,
        spacing,
        radius,
    })
}
