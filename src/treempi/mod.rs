//! Component F: Locally Essential Tree (LET) construction and exchange.
//!
//! Each rank walks its own tree once per peer, deciding cell-by-cell whether the peer
//! could possibly need it (MAC failure against the peer's sub-box, optionally ORed across
//! the periodic image lattice, or "too coarse to prune"), and packs the result into a
//! self-contained send buffer. Unlike the original `setLET`, which merges every peer's
//! reply into one combined array and rebases PARENT/CHILD by a running displacement, this
//! crate keeps each peer's LET as its own independent `Vec<Cell>`/`Vec<Body>` — identical
//! in shape to a local tree — since `traversal::traverse_remote` already visits one peer
//! at a time. That sidesteps the displacement-rebase pass entirely: every offset baked
//! into a `LetCell` during `let_build` is already relative to its own peer's block.

pub mod exchange;
pub mod fixup;
pub mod graft;
pub mod let_build;

use memoffset::offset_of;
use mpi::datatype::{Equivalence, UncommittedUserDatatype, UserDatatype};
use mpi::Address;

use crate::types::morton::{KeyType, MortonKey};

pub use exchange::{allgather_bounds, exchange_let};
pub use fixup::reconstruct_remote_trees;
pub use graft::graft_seed_locals;
pub use let_build::build_send_sets;

/// Wire form of a `Cell`, restricted to fields that are `Copy` and whose offsets are
/// relative to the sending rank's own send block (see module docs).
///
/// `parent`/`ichild` are `-1` to mean "no parent" (the block's root) and "no children"
/// respectively, since MPI datatypes can't carry `Option<usize>` directly.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct LetCell {
    pub x: [f64; 3],
    pub r: f64,
    pub parent: i64,
    pub ichild: i64,
    pub nchild: u8,
    pub ibody: i64,
    pub nbody: u32,
    pub icell: MortonKey,
    pub multipole_offset: u32,
    pub nterm: u32,
}

impl Default for LetCell {
    fn default() -> Self {
        LetCell {
            x: [0.0; 3],
            r: 0.0,
            parent: -1,
            ichild: -1,
            nchild: 0,
            ibody: -1,
            nbody: 0,
            icell: MortonKey::default(),
            multipole_offset: 0,
            nterm: 0,
        }
    }
}

unsafe impl Equivalence for LetCell {
    type Out = UserDatatype;
    fn equivalent_datatype() -> Self::Out {
        UserDatatype::structured(
            &[1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
            &[
                offset_of!(LetCell, x) as Address,
                offset_of!(LetCell, r) as Address,
                offset_of!(LetCell, parent) as Address,
                offset_of!(LetCell, ichild) as Address,
                offset_of!(LetCell, nchild) as Address,
                offset_of!(LetCell, ibody) as Address,
                offset_of!(LetCell, nbody) as Address,
                offset_of!(LetCell, icell) as Address,
                offset_of!(LetCell, multipole_offset) as Address,
                offset_of!(LetCell, nterm) as Address,
            ],
            &[
                UncommittedUserDatatype::contiguous(3, &f64::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &f64::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &i64::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &i64::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &u8::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &i64::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &u32::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::structured(
                    &[1, 1],
                    &[
                        offset_of!(MortonKey, anchor) as Address,
                        offset_of!(MortonKey, morton) as Address,
                    ],
                    &[
                        UncommittedUserDatatype::contiguous(3, &KeyType::equivalent_datatype())
                            .as_ref(),
                        UncommittedUserDatatype::contiguous(1, &KeyType::equivalent_datatype())
                            .as_ref(),
                    ],
                )
                .as_ref(),
                UncommittedUserDatatype::contiguous(1, &u32::equivalent_datatype()).as_ref(),
                UncommittedUserDatatype::contiguous(1, &u32::equivalent_datatype()).as_ref(),
            ],
        )
    }
}

/// A received peer's LET, shaped identically to a local tree so `traversal::traverse_remote`
/// can treat it the same way it would a local one.
pub struct RemoteTree {
    pub rank: mpi::topology::Rank,
    pub cells: Vec<crate::types::cell::Cell>,
    pub bodies: Vec<crate::types::body::Body>,
}
