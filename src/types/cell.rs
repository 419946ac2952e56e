//! Octree cell records, the unit the cell array (§3) is built from.

use crate::types::body::PointType;
use crate::types::morton::MortonKey;

/// Opaque expansion coefficients. The concrete basis (spherical harmonics, Cartesian
/// Taylor, etc) is a numeric-kernel concern outside this crate; `P2M`/`M2M`/`M2L`/`L2L`/
/// `L2P` only need to know how to allocate, add, and translate a buffer of this shape.
pub type Expansion = Vec<f64>;

/// A node of the octree. Cells are stored contiguously in a single `Vec<Cell>` per tree;
/// `parent`/`ichild` are indices into that same vector, never pointers.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Center of the cell's bounding box.
    pub x: [PointType; 3],
    /// Radius (half-diagonal) of the cell's bounding box.
    pub r: PointType,
    /// Index of the parent cell, `None` only for the root.
    pub parent: Option<usize>,
    /// Index of the first child; valid only when `nchild > 0`. Children occupy the
    /// `nchild` contiguous slots `[ichild, ichild + nchild)`.
    pub ichild: usize,
    /// Number of children, 0 for a leaf.
    pub nchild: u8,
    /// Offset of the cell's first body in the (rank-local, Morton-sorted) body array.
    pub ibody: usize,
    /// Number of bodies owned by this cell or any of its descendants.
    pub nbody: usize,
    /// Multipole expansion about `x`, valid after the upward pass.
    pub multipole: Expansion,
    /// Local expansion about `x`, valid after the downward pass.
    pub local: Expansion,
    /// Morton key of the cell.
    pub icell: MortonKey,
    /// Load-balancing weight, incremented by every P2P/M2L this cell participates in.
    pub weight: f64,
}

/// Accumulate `delta` into `acc` elementwise. An empty `acc` (a freshly allocated cell
/// that has never received a contribution) takes `delta`'s shape outright rather than
/// zipping against nothing.
pub fn add_into(acc: &mut Expansion, delta: &Expansion) {
    if acc.is_empty() {
        *acc = delta.clone();
        return;
    }
    for (a, d) in acc.iter_mut().zip(delta.iter()) {
        *a += d;
    }
}

impl Cell {
    /// A leaf placeholder cell with empty expansions, to be filled in by BuildTree.
    pub fn new_leaf(x: [PointType; 3], r: PointType, icell: MortonKey, ibody: usize, nbody: usize) -> Self {
        Cell {
            x,
            r,
            parent: None,
            ichild: 0,
            nchild: 0,
            ibody,
            nbody,
            multipole: Expansion::new(),
            local: Expansion::new(),
            icell,
            weight: 1.0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.nchild == 0
    }
}
