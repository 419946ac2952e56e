//! Receive-side reconstruction, the counterpart of `setLET`. Because each peer's LET
//! stayed in its own block throughout (see module docs in `treempi::mod`), this is just
//! slicing the combined receive buffers by each peer's counts and converting the wire
//! `LetCell` records into ordinary `Cell`s — no displacement rebase is needed.

use mpi::topology::Rank;

use crate::error::{FmmError, FmmResult};
use crate::types::cell::Cell;

use super::exchange::RecvBundle;
use super::{LetCell, RemoteTree};

fn to_cell(wire: &LetCell, expansions: &[f64]) -> FmmResult<Cell> {
    let start = wire.multipole_offset as usize;
    let end = start + wire.nterm as usize;
    if end > expansions.len() {
        return Err(FmmError::Internal(
            "LET cell's multipole range falls outside its peer's expansion buffer".to_string(),
        ));
    }

    Ok(Cell {
        x: wire.x,
        r: wire.r,
        parent: if wire.parent < 0 {
            None
        } else {
            Some(wire.parent as usize)
        },
        ichild: if wire.ichild < 0 { 0 } else { wire.ichild as usize },
        nchild: wire.nchild,
        ibody: if wire.ibody < 0 { 0 } else { wire.ibody as usize },
        nbody: wire.nbody as usize,
        multipole: expansions[start..end].to_vec(),
        local: Vec::new(),
        icell: wire.icell,
        weight: 1.0,
    })
}

/// Split the combined receive buffers back into one `RemoteTree` per peer that sent one,
/// skipping `my_rank`'s own (always-empty) slot.
pub fn reconstruct_remote_trees(recv: RecvBundle, my_rank: usize) -> FmmResult<Vec<RemoteTree>> {
    let nranks = recv.cell_counts.len();
    let mut cell_cursor = 0usize;
    let mut body_cursor = 0usize;
    let mut expansion_cursor = 0usize;
    let mut out = Vec::new();

    for rank in 0..nranks {
        let ncell = recv.cell_counts[rank] as usize;
        let nbody = recv.body_counts[rank] as usize;
        let nexp = recv.expansion_counts[rank] as usize;

        if rank != my_rank && ncell > 0 {
            let wire_cells = &recv.cells[cell_cursor..cell_cursor + ncell];
            let peer_bodies = recv.bodies[body_cursor..body_cursor + nbody].to_vec();
            let peer_expansions = &recv.expansions[expansion_cursor..expansion_cursor + nexp];

            let cells: FmmResult<Vec<Cell>> = wire_cells
                .iter()
                .map(|wire| to_cell(wire, peer_expansions))
                .collect();

            out.push(RemoteTree {
                rank: rank as Rank,
                cells: cells?,
                bodies: peer_bodies,
            });
        }

        cell_cursor += ncell;
        body_cursor += nbody;
        expansion_cursor += nexp;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::body::Body;
    use crate::types::morton::MortonKey;

    #[test]
    fn test_reconstructs_one_tree_per_nonempty_peer() {
        let wire_root = LetCell {
            x: [0.0; 3],
            r: 1.0,
            parent: -1,
            ichild: -1,
            nchild: 0,
            ibody: 0,
            nbody: 1,
            icell: MortonKey::default(),
            multipole_offset: 0,
            nterm: 1,
        };

        let recv = RecvBundle {
            cell_counts: vec![0, 1, 0],
            cells: vec![wire_root],
            body_counts: vec![0, 1, 0],
            bodies: vec![Body::default()],
            expansion_counts: vec![0, 1, 0],
            expansions: vec![4.2],
        };

        let trees = reconstruct_remote_trees(recv, 0).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].rank, 1);
        assert_eq!(trees[0].cells.len(), 1);
        assert!((trees[0].cells[0].multipole[0] - 4.2).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_multipole_offset_is_rejected() {
        let bad = LetCell {
            multipole_offset: 5,
            nterm: 1,
            ..LetCell::default()
        };
        assert!(to_cell(&bad, &[1.0, 2.0]).is_err());
    }
}
