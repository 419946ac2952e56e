//! Two-phase collective exchange for LET send sets, mirroring `commBodies`/`commCells`:
//! one `MPI_Alltoall` for the per-rank counts, one `MPI_Alltoallv`-equivalent for the
//! payload, done independently for cells, bodies, and flattened multipole coefficients.

use mpi::datatype::{Equivalence, Partition, PartitionMut};
use mpi::traits::*;

use crate::bounds::Bounds;
use crate::error::FmmResult;
use crate::types::body::Body;

use super::let_build::SendSet;
use super::LetCell;

/// Everything received from every peer, still addressed by per-peer `counts` — splitting
/// into individual peer trees happens in `fixup`.
pub struct RecvBundle {
    pub cell_counts: Vec<i32>,
    pub cells: Vec<LetCell>,
    pub body_counts: Vec<i32>,
    pub bodies: Vec<Body>,
    pub expansion_counts: Vec<i32>,
    pub expansions: Vec<f64>,
}

fn all_to_all_varcount<T, C>(comm: &C, per_rank: Vec<Vec<T>>) -> (Vec<i32>, Vec<T>)
where
    T: Equivalence + Default + Clone,
    C: Communicator,
{
    let gsize = comm.size() as usize;

    let send_counts: Vec<i32> = per_rank.iter().map(|v| v.len() as i32).collect();
    let mut send_displs = vec![0i32; gsize];
    for r in 1..gsize {
        send_displs[r] = send_displs[r - 1] + send_counts[r - 1];
    }
    let send_buffer: Vec<T> = per_rank.into_iter().flatten().collect();

    let mut recv_counts = vec![0i32; gsize];
    comm.all_to_all_into(&send_counts, &mut recv_counts[..]);

    let mut recv_displs = vec![0i32; gsize];
    for r in 1..gsize {
        recv_displs[r] = recv_displs[r - 1] + recv_counts[r - 1];
    }
    let total_recv: i32 = recv_counts.iter().sum();

    let mut recv_buffer = vec![T::default(); total_recv as usize];
    let send_partition = Partition::new(&send_buffer[..], send_counts, &send_displs[..]);
    let mut recv_partition =
        PartitionMut::new(&mut recv_buffer[..], recv_counts.clone(), &recv_displs[..]);
    comm.all_to_all_varcount_into(&send_partition, &mut recv_partition);

    (recv_counts, recv_buffer)
}

/// Exchange every rank's per-peer send sets, returning the raw received payload.
pub fn exchange_let<C: Communicator>(comm: &C, send_sets: Vec<SendSet>) -> FmmResult<RecvBundle> {
    let mut cells_per_rank = Vec::with_capacity(send_sets.len());
    let mut bodies_per_rank = Vec::with_capacity(send_sets.len());
    let mut expansions_per_rank = Vec::with_capacity(send_sets.len());

    for set in send_sets {
        cells_per_rank.push(set.cells);
        bodies_per_rank.push(set.bodies);
        expansions_per_rank.push(set.expansions);
    }

    let (cell_counts, cells) = all_to_all_varcount(comm, cells_per_rank);
    let (body_counts, bodies) = all_to_all_varcount(comm, bodies_per_rank);
    let (expansion_counts, expansions) = all_to_all_varcount(comm, expansions_per_rank);

    Ok(RecvBundle {
        cell_counts,
        cells,
        body_counts,
        bodies,
        expansion_counts,
        expansions,
    })
}

/// Gather every rank's local sub-box so LET send sets can be built against them.
pub fn allgather_bounds<C: Communicator>(comm: &C, local: &Bounds) -> FmmResult<Vec<Bounds>> {
    let gsize = comm.size() as usize;
    let local_flat = [
        local.min[0],
        local.min[1],
        local.min[2],
        local.max[0],
        local.max[1],
        local.max[2],
    ];
    let mut recv_flat = vec![0f64; 6 * gsize];
    comm.all_gather_into(&local_flat[..], &mut recv_flat[..]);

    Ok((0..gsize)
        .map(|r| {
            let base = 6 * r;
            Bounds {
                min: [recv_flat[base], recv_flat[base + 1], recv_flat[base + 2]],
                max: [recv_flat[base + 3], recv_flat[base + 4], recv_flat[base + 5]],
            }
        })
        .collect())
}
