//! Distributed Fast Multipole Method driver: adaptive octree construction over a
//! rank-local body set, ORB partitioning across ranks, locally essential tree exchange,
//! dual-tree traversal and a pluggable translation-operator kernel.
//!
//! Components map onto modules roughly one-to-one: [`bounds`] (A), [`partition`] (B),
//! [`tree::build`] (C), [`tree::updown`] (D), [`traversal`] (E), [`treempi`] (F) and
//! [`driver`] (G, the entry point most hosts want — [`driver::FmmDriver`]).

pub mod bounds;
pub mod config;
pub mod driver;
pub mod error;
pub mod kernel;
pub mod partition;
pub mod traversal;
pub mod tree;
pub mod treempi;
pub mod types;
pub mod verify;

pub use config::Config;
pub use driver::FmmDriver;
pub use error::{FmmError, FmmResult};
pub use kernel::{CoulombKernel, Kernel};
