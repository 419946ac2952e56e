//! Component D: UpDownPass. Post-order multipole aggregation, pre-order local
//! translation. Cells are stored so that every child's index is strictly greater than
//! its parent's (see `tree::build::linearize`), so a plain reverse/forward index scan
//! already visits cells in post-order/pre-order without needing an explicit stack.

use crate::config::Config;
use crate::kernel::Kernel;
use crate::types::body::Body;
use crate::types::cell::{add_into, Cell, Expansion};

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2]).sqrt()
}

/// Upward pass: `P2M` at every leaf, `M2M` at every internal cell, visited child-before-
/// parent. Optionally sharpens each cell's MAC radius (`use_rmax`/`use_ropt`).
pub fn upward_pass(cells: &mut [Cell], bodies: &[Body], kernel: &dyn Kernel, config: &Config) {
    for i in (0..cells.len()).rev() {
        if cells[i].is_leaf() {
            let ibody = cells[i].ibody;
            let nbody = cells[i].nbody;
            let center = cells[i].x;
            let leaf_bodies = &bodies[ibody..ibody + nbody];

            cells[i].multipole = kernel.p2m(center, leaf_bodies);

            if config.use_rmax {
                let mut rmax = 0.0f64;
                for body in leaf_bodies {
                    rmax = rmax.max(distance(center, body.x));
                }
                if rmax > 0.0 {
                    cells[i].r = rmax;
                }
            }
        } else {
            let ichild = cells[i].ichild;
            let nchild = cells[i].nchild as usize;

            let (left, right) = cells.split_at_mut(i + 1);
            let parent = &mut left[i];
            let child_refs: Vec<([f64; 3], &Expansion)> = (0..nchild)
                .map(|k| {
                    let child = &right[ichild - (i + 1) + k];
                    (child.x, &child.multipole)
                })
                .collect();

            parent.multipole = kernel.m2m(parent.x, &child_refs);

            if config.use_ropt {
                let mut ropt = 0.0f64;
                for k in 0..nchild {
                    let child = &right[ichild - (i + 1) + k];
                    ropt = ropt.max(distance(parent.x, child.x) + child.r);
                }
                if ropt > 0.0 {
                    parent.r = ropt;
                }
            }
        }
    }
}

/// Downward pass: `L2L` at every non-root cell, `L2P` at every leaf, visited parent-
/// before-child. `root_local` is added to whatever the traversal/LET phases have already
/// accumulated at the root (the cross-rank correction from grafting or remote LETs); every
/// other cell's `L2L` contribution is added to, not substituted for, the `M2L` hits its own
/// DTT pass already wrote there.
pub fn downward_pass(cells: &mut [Cell], bodies: &mut [Body], kernel: &dyn Kernel, root_local: Expansion) {
    if cells.is_empty() {
        return;
    }
    add_into(&mut cells[0].local, &root_local);

    for i in 0..cells.len() {
        if let Some(parent_index) = cells[i].parent {
            let (left, right) = cells.split_at_mut(i);
            let parent = &left[parent_index];
            let this = &mut right[0];
            let translated = kernel.l2l(this.x, parent.x, &parent.local);
            add_into(&mut this.local, &translated);
        }

        if cells[i].is_leaf() {
            let ibody = cells[i].ibody;
            let nbody = cells[i].nbody;
            let center = cells[i].x;
            let local = cells[i].local.clone();
            kernel.l2p(center, &local, &mut bodies[ibody..ibody + nbody]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::CoulombKernel;
    use crate::tree::build::build_tree;
    use crate::types::body::Body;
    use crate::types::domain::Domain;

    fn body_at(x: [f64; 3], src: f64) -> Body {
        let mut b = Body::default();
        b.x = x;
        b.src = src;
        b
    }

    fn unit_domain() -> Domain {
        Domain {
            origin: [-1.0, -1.0, -1.0],
            diameter: [2.0, 2.0, 2.0],
        }
    }

    #[test]
    fn test_upward_pass_root_multipole_is_total_charge() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 1,
            nspawn: 1000,
            ..Config::default()
        };
        let bodies = vec![
            body_at([0.1, 0.1, 0.1], 1.0),
            body_at([-0.1, -0.1, -0.1], 2.0),
            body_at([0.5, -0.5, 0.5], 3.0),
        ];
        let mut tree = build_tree(bodies, &domain, &config).unwrap();
        let kernel = CoulombKernel;
        upward_pass(&mut tree.cells, &tree.bodies, &kernel, &config);
        assert!((tree.cells[0].multipole[0] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_downward_pass_leaf_sees_root_local() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 32,
            ..Config::default()
        };
        let bodies = vec![body_at([0.1, 0.1, 0.1], 1.0)];
        let mut tree = build_tree(bodies, &domain, &config).unwrap();
        let kernel = CoulombKernel;
        downward_pass(&mut tree.cells, &mut tree.bodies, &kernel, vec![5.0]);
        assert!((tree.bodies[0].trg[0] - 5.0).abs() < 1e-12);
    }
}
