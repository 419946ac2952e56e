//! Components C and D: local octree construction and the upward/downward sweeps over it.

pub mod build;
pub mod updown;

pub use build::{build_tree, FmmTree};
