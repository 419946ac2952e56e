//! Brute-force P² direct summation via ring-shift, used both for the `Direct` driver
//! operation and as the accuracy reference for optional post-solve verification.
//!
//! Every rank holds a shard of source bodies. Over `size` rounds, each rank evaluates its
//! resident targets against its current shard, then hands that shard to the next rank on
//! a ring (`(rank+1) % size` / `(rank-1+size) % size`) via a non-blocking receive posted
//! ahead of a blocking send, so no rank waits on a send its neighbour hasn't already
//! posted a matching receive for. After `size` rounds every target has seen every body in
//! the system exactly once.

use mpi::collective::SystemOperation;
use mpi::request::scope;
use mpi::traits::*;

use crate::config::Config;
use crate::error::{FmmError, FmmResult};
use crate::kernel::Kernel;
use crate::types::body::{Bodies, Body};

/// Ring-shift `local_sources` past every rank's `targets`, accumulating the exact P2P
/// field. `targets` and `local_sources` may be disjoint or overlap (a rank's own shard
/// passes through its own targets on round 0 like any other).
pub fn ring_direct_sum<C: Communicator>(
    comm: &C,
    targets: &mut [Body],
    local_sources: &[Body],
    kernel: &dyn Kernel,
    period: [f64; 3],
) -> FmmResult<()> {
    let size = comm.size();
    if size == 0 {
        return Ok(());
    }
    let rank = comm.rank();
    let next = (rank + 1) % size;
    let prev = (rank - 1 + size) % size;

    let mut shard: Bodies = local_sources.to_vec();

    for _ in 0..size {
        kernel.p2p(targets, &shard, period);

        let send_count = shard.len() as i32;
        let mut recv_count = 0i32;
        scope(|scope| {
            let request = comm.process_at_rank(prev).immediate_receive_into(scope, &mut recv_count);
            comm.process_at_rank(next).send(&send_count);
            request.wait();
        });

        let mut recv_shard = vec![Body::default(); recv_count as usize];
        scope(|scope| {
            let request = comm.process_at_rank(prev).immediate_receive_into(scope, &mut recv_shard[..]);
            comm.process_at_rank(next).send(&shard[..]);
            request.wait();
        });

        shard = recv_shard;
    }

    Ok(())
}

/// Sample `config.num_targets` bodies out of `bodies` (which already carry a `Coulomb`
/// result), recompute their potential and force exactly via [`ring_direct_sum`], and
/// return the relative-L2 error across both. Raises `FmmError::Accuracy` if it exceeds
/// `config.accuracy_tolerance`. `seed` makes the sample reproducible across a run.
pub fn verify_against_direct<C: Communicator>(
    comm: &C,
    bodies: &Bodies,
    kernel: &dyn Kernel,
    config: &Config,
    period: [f64; 3],
    seed: u64,
) -> FmmResult<f64> {
    use rand::rngs::StdRng;
    use rand::seq::index::sample;
    use rand::SeedableRng;

    let n = bodies.len();
    let take = config.num_targets.min(n);
    let mut rng = StdRng::seed_from_u64(seed);
    let indices: Vec<usize> = if take > 0 {
        sample(&mut rng, n, take).into_iter().collect()
    } else {
        Vec::new()
    };

    let mut sampled: Bodies = indices.iter().map(|&i| bodies[i]).collect();
    for body in sampled.iter_mut() {
        body.trg = [0.0; 4];
    }

    ring_direct_sum(comm, &mut sampled, bodies, kernel, period)?;

    let mut local_num_pot = 0.0f64;
    let mut local_den_pot = 0.0f64;
    let mut local_num_force = 0.0f64;
    let mut local_den_force = 0.0f64;

    for (approx, &i) in sampled.iter().zip(indices.iter()) {
        let exact = bodies[i];
        let dpot = approx.trg[0] - exact.trg[0];
        local_num_pot += dpot * dpot;
        local_den_pot += exact.trg[0] * exact.trg[0];

        for d in 0..3 {
            let df = approx.trg[d + 1] - exact.trg[d + 1];
            local_num_force += df * df;
            local_den_force += exact.trg[d + 1] * exact.trg[d + 1];
        }
    }

    let mut num_pot = 0.0f64;
    comm.all_reduce_into(&local_num_pot, &mut num_pot, SystemOperation::sum());
    let mut den_pot = 0.0f64;
    comm.all_reduce_into(&local_den_pot, &mut den_pot, SystemOperation::sum());
    let mut num_force = 0.0f64;
    comm.all_reduce_into(&local_num_force, &mut num_force, SystemOperation::sum());
    let mut den_force = 0.0f64;
    comm.all_reduce_into(&local_den_force, &mut den_force, SystemOperation::sum());

    let rel_pot = if den_pot > 0.0 { (num_pot / den_pot).sqrt() } else { 0.0 };
    let rel_force = if den_force > 0.0 { (num_force / den_force).sqrt() } else { 0.0 };
    let error = rel_pot.max(rel_force);

    if comm.rank() == 0 {
        println!(
            "verification: relative L2 error, potential = {:.3e}, force = {:.3e}",
            rel_pot, rel_force
        );
    }

    if error > config.accuracy_tolerance {
        return Err(FmmError::Accuracy(format!(
            "relative L2 error {:.3e} exceeds tolerance {:.3e}",
            error, config.accuracy_tolerance
        )));
    }

    Ok(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::CoulombKernel;

    fn body_at(x: [f64; 3], src: f64) -> Body {
        let mut b = Body::default();
        b.x = x;
        b.src = src;
        b
    }

    #[test]
    fn test_p2p_kernel_used_by_verify_matches_direct_sum_single_rank_shape() {
        // A full ring exchange needs a live communicator; the single-process P2P math it
        // wraps is exercised directly here.
        let kernel = CoulombKernel;
        let mut targets = vec![body_at([0.0, 0.0, 0.0], 0.0)];
        let sources = vec![body_at([1.0, 0.0, 0.0], 2.0), body_at([0.0, 1.0, 0.0], 3.0)];
        kernel.p2p(&mut targets, &sources, [0.0, 0.0, 0.0]);
        assert!((targets[0].trg[0] - 5.0).abs() < 1e-9);
    }
}
