//! Optional grafted global tree (`config.graft`): instead of exchanging a full LET with
//! every peer, gather just each rank's tree root (center, radius, multipole) into one
//! flat sibling level, run the ordinary dual-tree traversal over that single level, and
//! hand each rank back the local expansion its root accumulated. Cheaper than full LET
//! exchange at the cost of treating every peer's whole tree as a single far-field source,
//! so it only replaces the LET step when the spec's `graft` option is set.

use mpi::datatype::PartitionMut;
use mpi::traits::*;

use crate::config::Config;
use crate::error::FmmResult;
use crate::kernel::Kernel;
use crate::traversal::traverse_self;
use crate::types::body::Body;
use crate::types::cell::{Cell, Expansion};
use crate::types::morton::MortonKey;

/// Gather every rank's `local_root`, run one flat-level dual-tree traversal across the
/// gathered roots, and return this rank's resulting local expansion (the seed for its own
/// downward pass).
pub fn graft_seed_locals<C: Communicator>(
    comm: &C,
    local_root: &Cell,
    kernel: &dyn Kernel,
    config: &Config,
    period: [f64; 3],
) -> FmmResult<Expansion> {
    let gsize = comm.size() as usize;
    let my_rank = comm.rank() as usize;

    let local_flat = [local_root.x[0], local_root.x[1], local_root.x[2], local_root.r];
    let mut recv_flat = vec![0f64; 4 * gsize];
    comm.all_gather_into(&local_flat[..], &mut recv_flat[..]);

    let nterm = local_root.multipole.len() as i32;
    let mut nterm_counts = vec![0i32; gsize];
    comm.all_gather_into(&nterm, &mut nterm_counts[..]);

    let mut displs = vec![0i32; gsize];
    for r in 1..gsize {
        displs[r] = displs[r - 1] + nterm_counts[r - 1];
    }
    let total: i32 = nterm_counts.iter().sum();

    let mut all_multipoles = vec![0f64; total as usize];
    let mut recv_partition = PartitionMut::new(&mut all_multipoles[..], nterm_counts.clone(), &displs[..]);
    comm.all_gather_varcount_into(&local_root.multipole[..], &mut recv_partition);

    let rank_cells: Vec<Cell> = (0..gsize)
        .map(|r| {
            let base = 4 * r;
            let x = [recv_flat[base], recv_flat[base + 1], recv_flat[base + 2]];
            let radius = recv_flat[base + 3];
            let mstart = displs[r] as usize;
            let mend = mstart + nterm_counts[r] as usize;
            Cell {
                x,
                r: radius,
                parent: Some(0),
                ichild: 0,
                nchild: 0,
                ibody: 0,
                nbody: 0,
                multipole: all_multipoles[mstart..mend].to_vec(),
                local: Expansion::new(),
                icell: MortonKey::default(),
                weight: 1.0,
            }
        })
        .collect();

    let mut center = [0.0f64; 3];
    for cell in &rank_cells {
        for d in 0..3 {
            center[d] += cell.x[d] / gsize as f64;
        }
    }
    let mut radius = 0.0f64;
    for cell in &rank_cells {
        let dx = [
            cell.x[0] - center[0],
            cell.x[1] - center[1],
            cell.x[2] - center[2],
        ];
        let dist = (dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2]).sqrt();
        radius = radius.max(dist + cell.r);
    }

    let root = Cell {
        x: center,
        r: radius,
        parent: None,
        ichild: 1,
        // `Cell::nchild` is a `u8` sized for octree fan-out; grafting repurposes it to hold
        // one child per rank, so graft mode tops out at 255 ranks.
        nchild: gsize as u8,
        ibody: 0,
        nbody: 0,
        multipole: kernel.zero_expansion(),
        local: Expansion::new(),
        icell: MortonKey::default(),
        weight: 1.0,
    };

    let mut cells = Vec::with_capacity(gsize + 1);
    cells.push(root);
    cells.extend(rank_cells);

    let mut bodies: Vec<Body> = Vec::new();
    traverse_self(&mut cells, &mut bodies, kernel, config, period)?;

    Ok(cells[1 + my_rank].local.clone())
}
