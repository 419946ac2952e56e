//! Per-peer send-set construction, grounded in `traverseLET`/`addSendCell`/`addSendBody`:
//! a queue-driven walk of the local tree that unconditionally records every cell it
//! reaches and only continues descending into a cell's children when that cell might
//! still matter to the peer.

use std::collections::{HashMap, VecDeque};

use crate::bounds::Bounds;
use crate::config::Config;
use crate::types::body::Body;
use crate::types::cell::Cell;

use super::LetCell;

/// One peer's worth of outgoing LET data: cells, the bodies their leaves own, and the
/// flattened multipole coefficients those cells carry.
#[derive(Default)]
pub struct SendSet {
    pub cells: Vec<LetCell>,
    pub bodies: Vec<Body>,
    pub expansions: Vec<f64>,
}

/// Nearest distance from a point to an axis-aligned box; zero if the point is inside.
fn box_distance(x: [f64; 3], b: &Bounds) -> f64 {
    let mut d2 = 0.0;
    for axis in 0..3 {
        let d = if x[axis] > b.max[axis] {
            x[axis] - b.max[axis]
        } else if x[axis] < b.min[axis] {
            x[axis] - b.min[axis]
        } else {
            0.0
        };
        d2 += d * d;
    }
    d2.sqrt()
}

/// The level at which every rank is assigned (at most) one cell of a hypothetical global
/// tree, used as the "too coarse to prune" cutoff: any local cell larger than a cell at
/// this level is kept regardless of what the MAC says, matching the original's
/// `CC->R > R0 / (1 << ILEVEL)` coarse-skeleton clause.
fn local_root_level(nranks: usize) -> u32 {
    if nranks <= 1 {
        0
    } else {
        (((nranks - 1) as f64).ln() / std::f64::consts::LN_2 / 3.0).floor() as u32 + 1
    }
}

/// Decide whether `cell` could matter to `peer_box`: either the plain MAC check fails, or
/// (with periodic images enabled) it fails under some lattice shift, or the cell is too
/// coarse relative to the local-root level to be pruned at all. Short-circuits on the
/// first failing offset.
fn must_include_children(
    cell: &Cell,
    peer_box: &Bounds,
    theta: f64,
    images: u32,
    period: [f64; 3],
    local_root_radius: f64,
) -> bool {
    if cell.r > local_root_radius {
        return true;
    }

    if images == 0 {
        let r = box_distance(cell.x, peer_box);
        return theta * r <= 2.0 * cell.r;
    }

    let shifts = images as i64;
    (-shifts..=shifts).any(|ix| {
        (-shifts..=shifts).any(|iy| {
            (-shifts..=shifts).any(|iz| {
                let shifted = [
                    cell.x[0] + ix as f64 * period[0],
                    cell.x[1] + iy as f64 * period[1],
                    cell.x[2] + iz as f64 * period[2],
                ];
                let r = box_distance(shifted, peer_box);
                theta * r <= 2.0 * cell.r
            })
        })
    })
}

fn push_cell(out: &mut SendSet, source: &Cell, parent_send_index: Option<usize>) -> usize {
    let send_index = out.cells.len();
    out.cells.push(LetCell {
        x: source.x,
        r: source.r,
        parent: parent_send_index.map(|p| p as i64).unwrap_or(-1),
        ichild: -1,
        nchild: 0,
        ibody: -1,
        nbody: source.nbody as u32,
        icell: source.icell,
        multipole_offset: 0,
        nterm: 0,
    });
    send_index
}

/// Build one peer's send set by walking `cells` breadth-first from the root, starting
/// with the root itself always included.
pub fn build_send_set_for_peer(
    cells: &[Cell],
    bodies: &[Body],
    peer_box: &Bounds,
    config: &Config,
    period: [f64; 3],
    local_root_radius: f64,
) -> SendSet {
    let mut out = SendSet::default();
    if cells.is_empty() {
        return out;
    }

    push_cell(&mut out, &cells[0], None);
    attach_multipole(&mut out, &cells[0]);

    let mut send_index_of: HashMap<usize, usize> = HashMap::new();
    send_index_of.insert(0, 0);

    let mut queue: VecDeque<usize> = VecDeque::new();
    queue.push_back(0);

    while let Some(local_idx) = queue.pop_front() {
        let send_parent_idx = send_index_of[&local_idx];
        let cell = &cells[local_idx];
        if cell.is_leaf() {
            continue;
        }

        for k in 0..cell.nchild as usize {
            let child_local = cell.ichild + k;
            let child = &cells[child_local];

            let send_idx = push_cell(&mut out, child, Some(send_parent_idx));
            if out.cells[send_parent_idx].nchild == 0 {
                out.cells[send_parent_idx].ichild = send_idx as i64;
            }
            out.cells[send_parent_idx].nchild += 1;
            send_index_of.insert(child_local, send_idx);

            attach_multipole(&mut out, child);

            if child.is_leaf() {
                let ibody_rel = out.bodies.len();
                out.bodies
                    .extend_from_slice(&bodies[child.ibody..child.ibody + child.nbody]);
                out.cells[send_idx].ibody = ibody_rel as i64;
            } else if must_include_children(
                child,
                peer_box,
                config.theta,
                config.images,
                period,
                local_root_radius,
            ) {
                queue.push_back(child_local);
            }
        }
    }

    out
}

fn attach_multipole(out: &mut SendSet, cell: &Cell) {
    let idx = out.cells.len() - 1;
    let offset = out.expansions.len();
    out.expansions.extend_from_slice(&cell.multipole);
    out.cells[idx].multipole_offset = offset as u32;
    out.cells[idx].nterm = cell.multipole.len() as u32;
}

/// Build one send set per peer rank (an empty one for `my_rank` itself, since a rank
/// never exchanges a LET with itself).
pub fn build_send_sets(
    cells: &[Cell],
    bodies: &[Body],
    peer_boxes: &[Bounds],
    my_rank: usize,
    config: &Config,
    period: [f64; 3],
) -> Vec<SendSet> {
    let nranks = peer_boxes.len();
    let level = local_root_level(nranks);
    let global_radius = cells.first().map(|c| c.r).unwrap_or(0.0);
    let local_root_radius = global_radius / (1u64 << level) as f64;

    (0..nranks)
        .map(|rank| {
            if rank == my_rank {
                SendSet::default()
            } else {
                build_send_set_for_peer(
                    cells,
                    bodies,
                    &peer_boxes[rank],
                    config,
                    period,
                    local_root_radius,
                )
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{CoulombKernel, Kernel};
    use crate::tree::build::build_tree;
    use crate::tree::updown::upward_pass;
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
    fn test_box_distance_is_zero_for_interior_point() {
        let b = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        assert_eq!(box_distance([0.5, 0.5, 0.5], &b), 0.0);
    }

    #[test]
    fn test_box_distance_is_positive_for_exterior_point() {
        let b = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        assert!((box_distance([2.0, 0.0, 0.0], &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_far_peer_box_sees_only_the_root() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 1,
            nspawn: 1000,
            theta: 0.4,
            ..Config::default()
        };
        let bodies = vec![
            body_at([0.5, 0.5, 0.5], 1.0),
            body_at([-0.5, -0.5, -0.5], 1.0),
        ];
        let mut tree = build_tree(bodies, &domain, &config).unwrap();
        let kernel = CoulombKernel;
        upward_pass(&mut tree.cells, &tree.bodies, &kernel, &config);

        let far_peer = Bounds {
            min: [100.0, 100.0, 100.0],
            max: [101.0, 101.0, 101.0],
        };
        let send = build_send_set_for_peer(
            &tree.cells,
            &tree.bodies,
            &far_peer,
            &config,
            [0.0; 3],
            1000.0,
        );
        assert_eq!(send.cells.len(), 1);
        assert_eq!(send.cells[0].parent, -1);
    }

    #[test]
    fn test_near_peer_box_descends_to_leaves() {
        let domain = unit_domain();
        let config = Config {
            ncrit: 1,
            nspawn: 1000,
            theta: 100.0,
            ..Config::default()
        };
        let bodies = vec![
            body_at([0.5, 0.5, 0.5], 1.0),
            body_at([-0.5, -0.5, -0.5], 1.0),
        ];
        let mut tree = build_tree(bodies, &domain, &config).unwrap();
        let kernel = CoulombKernel;
        upward_pass(&mut tree.cells, &tree.bodies, &kernel, &config);

        let close_peer = Bounds {
            min: [0.9, 0.9, 0.9],
            max: [1.0, 1.0, 1.0],
        };
        let send = build_send_set_for_peer(
            &tree.cells,
            &tree.bodies,
            &close_peer,
            &config,
            [0.0; 3],
            0.0,
        );
        assert_eq!(send.bodies.len(), 2);
        assert!(send.cells.len() > 1);
    }
}
