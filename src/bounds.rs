//! Component A: reduce a body set to an axis-aligned bounding box, and combine boxes
//! across ranks into the global `Domain` every Morton key is defined against.

use mpi::collective::SystemOperation;
use mpi::traits::*;

use crate::error::{FmmError, FmmResult};
use crate::types::body::Body;
use crate::types::domain::Domain;

/// An axis-aligned bounding box, expressed as a min/max corner pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Bounds {
    /// An inverted box (`min` at `+inf`, `max` at `-inf`) that absorbs any point via
    /// repeated calls to `extend`.
    pub fn empty() -> Self {
        Bounds {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    /// Widen this box to also cover `point`.
    pub fn extend_point(&mut self, point: &[f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    /// Widen this box to also cover `other`.
    pub fn extend_bounds(&mut self, other: &Bounds) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    pub fn is_degenerate(&self) -> bool {
        (0..3).any(|axis| !(self.max[axis] > self.min[axis]))
    }
}

/// Compute the local bounding box of a body set.
pub fn bounds(bodies: &[Body]) -> FmmResult<Bounds> {
    if bodies.is_empty() {
        return Err(FmmError::Degenerate("empty body set".to_string()));
    }

    let mut result = Bounds::empty();
    for body in bodies {
        result.extend_point(&body.x);
    }
    Ok(result)
}

/// Elementwise min/max reduction of a per-rank bounding box across all ranks.
pub fn reduce<C: Communicator>(local: &Bounds, comm: &C) -> FmmResult<Bounds> {
    let mut global_min = [0.0f64; 3];
    let mut global_max = [0.0f64; 3];

    comm.all_reduce_into(&local.min[..], &mut global_min[..], SystemOperation::min());
    comm.all_reduce_into(&local.max[..], &mut global_max[..], SystemOperation::max());

    let result = Bounds {
        min: global_min,
        max: global_max,
    };

    if result.is_degenerate() {
        return Err(FmmError::Degenerate(
            "global bounding box has zero or negative extent along some axis".to_string(),
        ));
    }

    Ok(result)
}

/// Convert a bounding box into a `Domain`: a cube centered on the box midpoint, sized to
/// the largest half-extent along any axis and inflated by a small numerical slack so
/// that bodies exactly on the boundary still map unambiguously to an interior anchor.
pub fn bounds_to_domain(bounds: &Bounds) -> FmmResult<Domain> {
    const INFLATION: f64 = 1.00001;

    let mut half_extent = 0.0f64;
    let mut center = [0.0f64; 3];
    for axis in 0..3 {
        center[axis] = 0.5 * (bounds.min[axis] + bounds.max[axis]);
        half_extent = half_extent.max(0.5 * (bounds.max[axis] - bounds.min[axis]));
    }

    if half_extent <= 0.0 {
        return Err(FmmError::Degenerate(
            "bounding box radius is non-positive".to_string(),
        ));
    }

    let radius = half_extent * INFLATION;
    let side = 2.0 * radius;

    Ok(Domain {
        origin: [
            center[0] - radius,
            center[1] - radius,
            center[2] - radius,
        ],
        diameter: [side, side, side],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_at(x: [f64; 3]) -> Body {
        let mut body = Body::default();
        body.x = x;
        body
    }

    #[test]
    fn test_bounds_of_single_body_is_a_point() {
        let bodies = vec![body_at([1.0, 2.0, 3.0])];
        let b = bounds(&bodies).unwrap();
        assert_eq!(b.min, [1.0, 2.0, 3.0]);
        assert_eq!(b.max, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_bounds_empty_is_degenerate() {
        let bodies: Vec<Body> = Vec::new();
        assert!(bounds(&bodies).is_err());
    }

    #[test]
    fn test_domain_is_cube_and_inflated() {
        let b = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 2.0, 1.0],
        };
        let domain = bounds_to_domain(&b).unwrap();
        assert!((domain.diameter[0] - domain.diameter[1]).abs() < 1e-12);
        assert!(domain.diameter[0] > 2.0);
    }

    #[test]
    fn test_degenerate_point_box_is_rejected() {
        let b = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [0.0, 0.0, 0.0],
        };
        assert!(bounds_to_domain(&b).is_err());
    }
}
