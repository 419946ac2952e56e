//! The five-way error taxonomy the driver surfaces to host code.

use std::fmt;

/// Errors the driver can raise. See the propagation rules in the crate-level docs for
/// how each kind is handled by `FmmDriver`.
#[derive(Debug, Clone)]
pub enum FmmError {
    /// Empty body set, zero radius, or collinear bodies yielding a singular box.
    Degenerate(String),
    /// A partitioning step would give a rank more than the configured body cap.
    Imbalance(String),
    /// A collective reported failure, or its counts didn't match across ranks.
    Transport(String),
    /// Verification relative-L2 error exceeded the configured tolerance.
    Accuracy(String),
    /// An invariant was violated (NBODY mismatch, orphan child, ...).
    Internal(String),
}

impl fmt::Display for FmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FmmError::Degenerate(msg) => write!(f, "degenerate input: {}", msg),
            FmmError::Imbalance(msg) => write!(f, "partition imbalance: {}", msg),
            FmmError::Transport(msg) => write!(f, "transport failure: {}", msg),
            FmmError::Accuracy(msg) => write!(f, "accuracy check failed: {}", msg),
            FmmError::Internal(msg) => write!(f, "internal invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for FmmError {}

pub type FmmResult<T> = Result<T, FmmError>;
