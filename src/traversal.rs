//! Component E: the dual tree traversal (DTT).
//!
//! `traverse_self` walks a rank's own tree against itself (used for the local interaction
//! list); `traverse_remote` walks a rank's tree against one peer's locally essential tree
//! (LET), writing only into the local side. Both share the MAC/split decision in
//! [`periodic_min_image`] and the "split the larger cell, ties broken by `ibody`"
//! convention from §4.E and §9.

use crate::config::Config;
use crate::error::FmmResult;
use crate::kernel::Kernel;
use crate::types::body::Body;
use crate::types::cell::{add_into, Cell};

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2]).sqrt()
}

/// Periodic-minimum-image translation and distance between two cell centers. `images==0`
/// is free space: no wrap, translation is zero.
fn periodic_min_image(ci_x: [f64; 3], cj_x: [f64; 3], period: [f64; 3], images: u32) -> ([f64; 3], f64) {
    if images == 0 {
        return ([0.0, 0.0, 0.0], distance(ci_x, cj_x));
    }
    let mut shift = [0.0f64; 3];
    let mut wrapped = cj_x;
    for d in 0..3 {
        if period[d] == 0.0 {
            continue;
        }
        let raw = cj_x[d] - ci_x[d];
        let n = (raw / period[d]).round();
        shift[d] = -n * period[d];
        wrapped[d] = cj_x[d] + shift[d];
    }
    (shift, distance(ci_x, wrapped))
}

fn leaf_self_p2p(bodies: &mut [Body], kernel: &dyn Kernel) {
    let snapshot = bodies.to_vec();
    kernel.p2p(bodies, &snapshot, [0.0, 0.0, 0.0]);
}

/// Split `bodies` into two disjoint mutable slices covering `range_a` and `range_b`,
/// which are guaranteed non-overlapping (distinct leaves partition the body array) but
/// not necessarily ordered.
fn body_pair_mut(
    bodies: &mut [Body],
    range_a: (usize, usize),
    range_b: (usize, usize),
) -> (&mut [Body], &mut [Body]) {
    let (a0, a1) = range_a;
    let (b0, b1) = range_b;
    if a1 <= b0 {
        let (left, right) = bodies.split_at_mut(b0);
        (&mut left[a0..a1], &mut right[..b1 - b0])
    } else {
        let (left, right) = bodies.split_at_mut(a0);
        (&mut right[..a1 - a0], &mut left[b0..b1])
    }
}

fn cell_pair_mut(cells: &mut [Cell], i: usize, j: usize) -> (&mut Cell, &mut Cell) {
    if i < j {
        let (left, right) = cells.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = cells.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// Which cell to recurse on, ties broken toward the smaller `ibody` (§9 open-question
/// decision).
fn split_ci(ci: &Cell, cj: &Cell) -> bool {
    if ci.r > cj.r {
        true
    } else if cj.r > ci.r {
        false
    } else {
        ci.ibody <= cj.ibody
    }
}

/// Traverse `cells`/`bodies` against themselves. Each unordered cell pair is visited
/// exactly once; `config.mutual` only selects whether leaf-leaf P2P uses the kernel's
/// fused two-sided call or two ordinary ones; `M2L` always writes both directions per
/// visit since it has no one-sided analogue.
pub fn traverse_self(
    cells: &mut [Cell],
    bodies: &mut [Body],
    kernel: &dyn Kernel,
    config: &Config,
    period: [f64; 3],
) -> FmmResult<()> {
    if cells.is_empty() {
        return Ok(());
    }
    for cell in cells.iter_mut() {
        cell.local = kernel.zero_expansion();
    }

    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    while let Some((i, j)) = stack.pop() {
        let ci = cells[i].clone_geometry();
        let cj = cells[j].clone_geometry();
        let (shift, r_ij) = periodic_min_image(ci.x, cj.x, period, config.images);

        if i != j && config.theta * r_ij > ci.r + cj.r {
            let m2l_ij = kernel.m2l(ci.x, cj.x, &cells[j].multipole, shift);
            let neg_shift = [-shift[0], -shift[1], -shift[2]];
            let m2l_ji = kernel.m2l(cj.x, ci.x, &cells[i].multipole, neg_shift);
            let (cell_i, cell_j) = cell_pair_mut(cells, i, j);
            add_into(&mut cell_i.local, &m2l_ij);
            add_into(&mut cell_j.local, &m2l_ji);
            cell_i.weight += 1.0;
            cell_j.weight += 1.0;
            continue;
        }

        if i == j {
            if ci.is_leaf {
                let slice = &mut bodies[ci.ibody..ci.ibody + ci.nbody];
                leaf_self_p2p(slice, kernel);
                cells[i].weight += 1.0;
            } else {
                for a in 0..ci.nchild as usize {
                    for b in a..ci.nchild as usize {
                        stack.push((ci.ichild + a, ci.ichild + b));
                    }
                }
            }
            continue;
        }

        if ci.is_leaf && cj.is_leaf {
            let (slice_i, slice_j) = body_pair_mut(
                bodies,
                (ci.ibody, ci.ibody + ci.nbody),
                (cj.ibody, cj.ibody + cj.nbody),
            );
            if config.mutual {
                kernel.p2p_mutual(slice_i, slice_j, shift);
            } else {
                let neg_shift = [-shift[0], -shift[1], -shift[2]];
                let snapshot_j = slice_j.to_vec();
                kernel.p2p(slice_i, &snapshot_j, shift);
                let snapshot_i = slice_i.to_vec();
                kernel.p2p(slice_j, &snapshot_i, neg_shift);
            }
            cells[i].weight += 1.0;
            cells[j].weight += 1.0;
            continue;
        }

        if ci.is_leaf && !cj.is_leaf {
            for b in 0..cj.nchild as usize {
                stack.push((i, cj.ichild + b));
            }
        } else if !ci.is_leaf && cj.is_leaf {
            for a in 0..ci.nchild as usize {
                stack.push((ci.ichild + a, j));
            }
        } else if split_ci(&cells[i], &cells[j]) {
            for a in 0..ci.nchild as usize {
                stack.push((ci.ichild + a, j));
            }
        } else {
            for b in 0..cj.nchild as usize {
                stack.push((i, cj.ichild + b));
            }
        }
    }

    Ok(())
}

/// Traverse the local tree against a peer's locally essential tree. Only the local side
/// (`local_cells`/`local_bodies`) is mutated; the remote LET is read-only.
pub fn traverse_remote(
    local_cells: &mut [Cell],
    local_bodies: &mut [Body],
    remote_cells: &[Cell],
    remote_bodies: &[Body],
    kernel: &dyn Kernel,
    config: &Config,
    period: [f64; 3],
) -> FmmResult<()> {
    if local_cells.is_empty() || remote_cells.is_empty() {
        return Ok(());
    }

    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    while let Some((i, j)) = stack.pop() {
        let cj = &remote_cells[j];
        let (ci_x, ci_r, ci_leaf) = {
            let c = &local_cells[i];
            (c.x, c.r, c.is_leaf())
        };
        let (shift, r_ij) = periodic_min_image(ci_x, cj.x, period, config.images);

        if config.theta * r_ij > ci_r + cj.r {
            let m2l = kernel.m2l(ci_x, cj.x, &cj.multipole, shift);
            add_into(&mut local_cells[i].local, &m2l);
            local_cells[i].weight += 1.0;
            continue;
        }

        let cj_leaf = cj.is_leaf();
        if ci_leaf && cj_leaf {
            let ibody = local_cells[i].ibody;
            let nbody = local_cells[i].nbody;
            kernel.p2p(
                &mut local_bodies[ibody..ibody + nbody],
                &remote_bodies[cj.ibody..cj.ibody + cj.nbody],
                shift,
            );
            local_cells[i].weight += 1.0;
        } else if ci_leaf && !cj_leaf {
            let ichild = cj.ichild;
            let nchild = cj.nchild as usize;
            for b in 0..nchild {
                stack.push((i, ichild + b));
            }
        } else if !ci_leaf && cj_leaf {
            let ichild = local_cells[i].ichild;
            let nchild = local_cells[i].nchild as usize;
            for a in 0..nchild {
                stack.push((ichild + a, j));
            }
        } else if ci_r >= cj.r {
            let ichild = local_cells[i].ichild;
            let nchild = local_cells[i].nchild as usize;
            for a in 0..nchild {
                stack.push((ichild + a, j));
            }
        } else {
            let ichild = cj.ichild;
            let nchild = cj.nchild as usize;
            for b in 0..nchild {
                stack.push((i, ichild + b));
            }
        }
    }

    Ok(())
}

struct CellGeometry {
    x: [f64; 3],
    r: f64,
    ibody: usize,
    nbody: usize,
    ichild: usize,
    nchild: u8,
    is_leaf: bool,
}

impl Cell {
    fn clone_geometry(&self) -> CellGeometry {
        CellGeometry {
            x: self.x,
            r: self.r,
            ibody: self.ibody,
            nbody: self.nbody,
            ichild: self.ichild,
            nchild: self.nchild,
            is_leaf: self.is_leaf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::CoulombKernel;
    use crate::tree::build::build_tree;
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
    fn test_self_traversal_p2p_matches_direct_sum() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 1,
            nspawn: 1000,
            theta: 100.0, // force P2P everywhere, no M2L
            ..Config::default()
        };
        let bodies = vec![
            body_at([0.1, 0.1, 0.1], 1.0),
            body_at([0.5, -0.5, 0.2], 2.0),
            body_at([-0.3, 0.4, -0.1], 3.0),
        ];
        let mut tree = build_tree(bodies.clone(), &domain, &config).unwrap();
        let kernel = CoulombKernel;
        crate::tree::updown::upward_pass(&mut tree.cells, &tree.bodies, &kernel, &config);
        traverse_self(&mut tree.cells, &mut tree.bodies, &kernel, &config, [0.0, 0.0, 0.0]).unwrap();

        let mut expected = bodies;
        for i in 0..expected.len() {
            for j in 0..expected.len() {
                if i == j {
                    continue;
                }
                let src = expected[j].clone();
                let target = std::slice::from_mut(&mut expected[i]);
                kernel.p2p(target, &[src], [0.0, 0.0, 0.0]);
            }
        }

        let mut got: Vec<f64> = tree.bodies.iter().map(|b| b.trg[0]).collect();
        let mut want: Vec<f64> = expected.iter().map(|b| b.trg[0]).collect();
        got.sort_by(|a, b| a.partial_cmp(b).unwrap());
        want.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-9, "{} != {}", g, w);
        }
    }

    #[test]
    fn test_remote_traversal_only_mutates_local_side() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 32,
            theta: 100.0,
            ..Config::default()
        };
        let mut local = build_tree(vec![body_at([0.1, 0.1, 0.1], 1.0)], &domain, &config).unwrap();
        let remote = build_tree(vec![body_at([-0.5, -0.5, -0.5], 2.0)], &domain, &config).unwrap();
        let kernel = CoulombKernel;
        crate::tree::updown::upward_pass(&mut local.cells, &local.bodies, &kernel, &config);
        let mut remote_cells = remote.cells;
        crate::tree::updown::upward_pass(&mut remote_cells, &remote.bodies, &kernel, &config);

        traverse_remote(
            &mut local.cells,
            &mut local.bodies,
            &remote_cells,
            &remote.bodies,
            &kernel,
            &config,
            [0.0, 0.0, 0.0],
        )
        .unwrap();

        assert!(local.bodies[0].trg[0] > 0.0);
    }
}
