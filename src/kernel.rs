//! The P2M/M2M/M2L/L2L/L2P/P2P translation operators.
//!
//! These are the numeric-kernel boundary the rest of the crate treats as opaque: the tree,
//! partition, traversal and driver logic never interpret the contents of an `Expansion`,
//! only move, combine and translate them through this trait. [`CoulombKernel`] is the one
//! concrete implementation shipped here, truncated to the monopole term (total charge, no
//! dipole/quadrupole correction) so the rest of the driver has something real to exercise
//! and verify against a direct sum without pulling in a spherical-harmonics library.

use crate::types::body::Body;
use crate::types::cell::Expansion;

/// A pair of FMM translation operators bound to a particular potential.
pub trait Kernel: Send + Sync {
    /// Aggregate a leaf's bodies into a multipole expansion about `center`.
    fn p2m(&self, center: [f64; 3], bodies: &[Body]) -> Expansion;

    /// Combine child multipoles, each already translated conceptually to `parent_center`,
    /// into the parent's multipole.
    fn m2m(&self, parent_center: [f64; 3], children: &[([f64; 3], &Expansion)]) -> Expansion;

    /// Translate `source`'s multipole into a local expansion contribution at
    /// `target_center`, `periodic_shift` away from `source_center`.
    fn m2l(
        &self,
        target_center: [f64; 3],
        source_center: [f64; 3],
        source_multipole: &Expansion,
        periodic_shift: [f64; 3],
    ) -> Expansion;

    /// Translate a parent's local expansion down to `child_center`.
    fn l2l(&self, child_center: [f64; 3], parent_center: [f64; 3], parent_local: &Expansion) -> Expansion;

    /// Evaluate a cell's local expansion at each of its bodies, accumulating into `TRG`.
    fn l2p(&self, cell_center: [f64; 3], local: &Expansion, bodies: &mut [Body]);

    /// Direct body-body interaction: accumulate `sources`'s effect on `targets`.
    fn p2p(&self, targets: &mut [Body], sources: &[Body], periodic_shift: [f64; 3]);

    /// Symmetric direct interaction used in mutual traversal mode: `a` and `b` accumulate
    /// each other's contribution in a single pass.
    fn p2p_mutual(&self, a: &mut [Body], b: &mut [Body], periodic_shift: [f64; 3]);

    /// Combine two multipoles of the same cell (used when merging grafted subtrees).
    fn zero_expansion(&self) -> Expansion;
}

/// Monopole-truncated 1/r (electrostatic or Newtonian) potential.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoulombKernel;

fn pairwise(target: &mut Body, source: &Body, shift: [f64; 3]) {
    let dx = [
        target.x[0] - (source.x[0] + shift[0]),
        target.x[1] - (source.x[1] + shift[1]),
        target.x[2] - (source.x[2] + shift[2]),
    ];
    let r2 = dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2];
    if r2 == 0.0 {
        return;
    }
    let r = r2.sqrt();
    let inv_r = 1.0 / r;
    let inv_r3 = inv_r / r2;

    target.trg[0] += source.src * inv_r;
    target.trg[1] += source.src * dx[0] * inv_r3;
    target.trg[2] += source.src * dx[1] * inv_r3;
    target.trg[3] += source.src * dx[2] * inv_r3;
}

impl Kernel for CoulombKernel {
    fn p2m(&self, _center: [f64; 3], bodies: &[Body]) -> Expansion {
        vec![bodies.iter().map(|b| b.src).sum()]
    }

    fn m2m(&self, _parent_center: [f64; 3], children: &[([f64; 3], &Expansion)]) -> Expansion {
        vec![children.iter().map(|(_, m)| m[0]).sum()]
    }

    fn m2l(
        &self,
        target_center: [f64; 3],
        source_center: [f64; 3],
        source_multipole: &Expansion,
        periodic_shift: [f64; 3],
    ) -> Expansion {
        let dx = [
            target_center[0] - (source_center[0] + periodic_shift[0]),
            target_center[1] - (source_center[1] + periodic_shift[1]),
            target_center[2] - (source_center[2] + periodic_shift[2]),
        ];
        let r = (dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2]).sqrt();
        if r == 0.0 {
            return vec![0.0];
        }
        vec![source_multipole[0] / r]
    }

    fn l2l(&self, _child_center: [f64; 3], _parent_center: [f64; 3], parent_local: &Expansion) -> Expansion {
        // Monopole truncation: the local expansion is a single constant potential value,
        // whose 0th-order Taylor translation is itself.
        parent_local.clone()
    }

    fn l2p(&self, _cell_center: [f64; 3], local: &Expansion, bodies: &mut [Body]) {
        for body in bodies {
            body.trg[0] += local[0];
        }
    }

    fn p2p(&self, targets: &mut [Body], sources: &[Body], periodic_shift: [f64; 3]) {
        for target in targets.iter_mut() {
            for source in sources {
                pairwise(target, source, periodic_shift);
            }
        }
    }

    fn p2p_mutual(&self, a: &mut [Body], b: &mut [Body], periodic_shift: [f64; 3]) {
        let neg_shift = [-periodic_shift[0], -periodic_shift[1], -periodic_shift[2]];
        for target in a.iter_mut() {
            for source in b.iter() {
                pairwise(target, source, periodic_shift);
            }
        }
        for target in b.iter_mut() {
            for source in a.iter() {
                pairwise(target, source, neg_shift);
            }
        }
    }

    fn zero_expansion(&self) -> Expansion {
        vec![0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_at(x: [f64; 3], src: f64) -> Body {
        let mut b = Body::default();
        b.x = x;
        b.src = src;
        b
    }

    #[test]
    fn test_p2p_matches_inverse_distance_potential() {
        let kernel = CoulombKernel;
        let mut targets = vec![body_at([0.0, 0.0, 0.0], 0.0)];
        let sources = vec![body_at([1.0, 0.0, 0.0], 2.0)];
        kernel.p2p(&mut targets, &sources, [0.0, 0.0, 0.0]);
        assert!((targets[0].trg[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_p2m_sums_charge() {
        let kernel = CoulombKernel;
        let bodies = vec![body_at([0.0, 0.0, 0.0], 1.0), body_at([1.0, 1.0, 1.0], 3.0)];
        let m = kernel.p2m([0.5, 0.5, 0.5], &bodies);
        assert!((m[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_p2p_mutual_is_symmetric_with_equal_and_opposite_force() {
        let kernel = CoulombKernel;
        let mut a = vec![body_at([0.0, 0.0, 0.0], 1.0)];
        let mut b = vec![body_at([2.0, 0.0, 0.0], 1.0)];
        kernel.p2p_mutual(&mut a, &mut b, [0.0, 0.0, 0.0]);
        assert!((a[0].trg[1] + b[0].trg[1]).abs() < 1e-12);
    }
}
