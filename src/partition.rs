//! Component B: orthogonal recursive bisection (ORB) partitioning of bodies across ranks.

use mpi::collective::SystemOperation;
use mpi::datatype::{Partition, PartitionMut};
use mpi::topology::{Color, Rank, UserCommunicator};
use mpi::traits::*;

use crate::bounds::Bounds;
use crate::error::{FmmError, FmmResult};
use crate::types::body::{Bodies, Body};
use crate::types::domain::Domain;

/// Fraction of the current group's box radius below which the bisection search stops
/// refining the split coordinate, per §4.B.
const EPSILON: f64 = 1e-10;
const MAX_BISECTION_STEPS: usize = 64;

/// Recursively bisect `bodies` across the ranks of `comm`, alternating the split axis
/// x→y→z→x starting from `start_axis`, and return this rank's bodies together with its
/// sub-box of `group_box`.
///
/// `comm` must contain exactly the ranks participating in this (sub)partition; the
/// top-level caller passes the full world (duplicated) communicator.
fn orb_recurse(
    mut bodies: Bodies,
    group_box: Bounds,
    start_axis: usize,
    comm: UserCommunicator,
) -> FmmResult<(Bodies, Bounds)> {
    let gsize = comm.size();

    if gsize == 1 {
        return Ok((bodies, group_box));
    }

    let grank = comm.rank();
    let axis = start_axis % 3;

    let left_size = (gsize + 1) / 2;
    let right_size = gsize - left_size;

    let local_count = bodies.len() as i64;
    let mut total_count = 0i64;
    comm.all_reduce_into(&local_count, &mut total_count, SystemOperation::sum());
    let target_left: i64 = ((total_count as i128) * (left_size as i128) / (gsize as i128)) as i64;

    let mut lo = group_box.min[axis];
    let mut hi = group_box.max[axis];
    let width_tol = EPSILON * group_box.max[axis].max(group_box.min[axis]).abs().max(1.0);

    let mut split = 0.5 * (lo + hi);
    for _ in 0..MAX_BISECTION_STEPS {
        split = 0.5 * (lo + hi);
        if (hi - lo).abs() <= width_tol {
            break;
        }

        let local_left = bodies.iter().filter(|b| b.x[axis] < split).count() as i64;
        let mut total_left = 0i64;
        comm.all_reduce_into(&local_left, &mut total_left, SystemOperation::sum());

        if (total_left - target_left).abs() <= 1 {
            break;
        } else if total_left < target_left {
            lo = split;
        } else {
            hi = split;
        }
    }

    let (left_bodies, right_bodies): (Bodies, Bodies) =
        bodies.drain(..).partition(|b| b.x[axis] < split);

    let n_left_local = left_bodies.len() as i64;
    let n_right_local = right_bodies.len() as i64;

    // Exclusive prefix sum of how many bodies each rank is contributing to each side,
    // so every body can be handed a concrete destination rank within its side without
    // funnelling them all through rank 0.
    let mut inclusive_left = 0i64;
    comm.scan_into(&n_left_local, &mut inclusive_left, SystemOperation::sum());
    let prefix_left = inclusive_left - n_left_local;
    let mut inclusive_right = 0i64;
    comm.scan_into(&n_right_local, &mut inclusive_right, SystemOperation::sum());
    let prefix_right = inclusive_right - n_right_local;

    let mut destinations: Vec<Rank> = Vec::with_capacity(bodies.capacity());
    let mut payload: Bodies = Vec::with_capacity(left_bodies.len() + right_bodies.len());

    for (i, body) in left_bodies.into_iter().enumerate() {
        let slot = prefix_left + i as i64;
        let dest = slot % (left_size as i64);
        destinations.push(dest as Rank);
        payload.push(body);
    }
    for (i, body) in right_bodies.into_iter().enumerate() {
        let slot = prefix_right + i as i64;
        let dest = left_size as i64 + slot % (right_size as i64);
        destinations.push(dest as Rank);
        payload.push(body);
    }

    let redistributed = all_to_all_bodies(&comm, payload, &destinations)?;

    let in_left = grank < left_size as Rank;
    let sub_box = if in_left {
        let mut b = group_box;
        b.max[axis] = split;
        b
    } else {
        let mut b = group_box;
        b.min[axis] = split;
        b
    };

    let color = if in_left { 0 } else { 1 };
    let sub_comm = comm
        .split_by_color(Color::with_value(color))
        .ok_or_else(|| FmmError::Transport("failed to split communicator during ORB".to_string()))?;

    orb_recurse(redistributed, sub_box, axis + 1, sub_comm)
}

/// Two-phase all-to-all: exchange per-rank counts, then the bodies themselves.
fn all_to_all_bodies(
    comm: &UserCommunicator,
    bodies: Bodies,
    destinations: &[Rank],
) -> FmmResult<Bodies> {
    let gsize = comm.size() as usize;

    let mut send_counts = vec![0i32; gsize];
    for &dest in destinations {
        send_counts[dest as usize] += 1;
    }

    // Bucket bodies by destination so the payload is contiguous per rank.
    let mut send_displs = vec![0i32; gsize];
    for r in 1..gsize {
        send_displs[r] = send_displs[r - 1] + send_counts[r - 1];
    }
    let mut cursors = send_displs.clone();
    let mut send_buffer = vec![Body::default(); bodies.len()];
    for (body, &dest) in bodies.into_iter().zip(destinations.iter()) {
        let slot = cursors[dest as usize];
        send_buffer[slot as usize] = body;
        cursors[dest as usize] += 1;
    }

    let mut recv_counts = vec![0i32; gsize];
    comm.all_to_all_into(&send_counts, &mut recv_counts[..]);

    let mut recv_displs = vec![0i32; gsize];
    for r in 1..gsize {
        recv_displs[r] = recv_displs[r - 1] + recv_counts[r - 1];
    }
    let total_recv: i32 = recv_counts.iter().sum();

    let mut recv_buffer = vec![Body::default(); total_recv as usize];

    let send_partition = Partition::new(&send_buffer[..], send_counts, &send_displs[..]);
    let mut recv_partition = PartitionMut::new(&mut recv_buffer[..], recv_counts, &recv_displs[..]);
    comm.all_to_all_varcount_into(&send_partition, &mut recv_partition);

    Ok(recv_buffer)
}

/// Run the full ORB partition described in §4.B: bisect `bodies` across every rank of
/// `comm`, returning this rank's bodies and its sub-box of `domain`.
///
/// Fails with `FmmError::Imbalance` if any rank would end up owning more than
/// `imbalance_cap` bodies after migration.
pub fn partition(
    bodies: Bodies,
    domain: &Domain,
    comm: &UserCommunicator,
    imbalance_cap: usize,
) -> FmmResult<(Bodies, Bounds)> {
    let group_box = Bounds {
        min: domain.origin,
        max: [
            domain.origin[0] + domain.diameter[0],
            domain.origin[1] + domain.diameter[1],
            domain.origin[2] + domain.diameter[2],
        ],
    };

    let (local_bodies, sub_box) = orb_recurse(bodies, group_box, 0, comm.duplicate())?;

    if local_bodies.len() > imbalance_cap {
        return Err(FmmError::Imbalance(format!(
            "rank {} holds {} bodies, exceeding cap {}",
            comm.rank(),
            local_bodies.len(),
            imbalance_cap
        )));
    }

    Ok((local_bodies, sub_box))
}

/// Verify invariant 2 (§8): every body lies within `sub_box`.
pub fn bodies_within_bounds(bodies: &[Body], sub_box: &Bounds) -> bool {
    bodies.iter().all(|b| {
        (0..3).all(|axis| b.x[axis] >= sub_box.min[axis] && b.x[axis] <= sub_box.max[axis])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bodies_within_bounds_accepts_interior_point() {
        let sub_box = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        let mut body = Body::default();
        body.x = [0.5, 0.5, 0.5];
        assert!(bodies_within_bounds(&[body], &sub_box));
    }

    #[test]
    fn test_bodies_within_bounds_rejects_exterior_point() {
        let sub_box = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        let mut body = Body::default();
        body.x = [2.0, 0.5, 0.5];
        assert!(!bodies_within_bounds(&[body], &sub_box));
    }
}
