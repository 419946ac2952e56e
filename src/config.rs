//! Driver configuration: the options table from the External Interfaces section.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FmmError, FmmResult};

/// Ingest mode. `External` means the host supplies bodies directly (the only mode this
/// crate implements); other variants are accepted for forward compatibility with host
/// configs that also drive the out-of-scope random-distribution generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    External,
    Cube,
    Plummer,
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::External
    }
}

/// Driver configuration, mirroring the options table in the External Interfaces spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum body count per leaf cell.
    pub ncrit: usize,
    /// Body-count threshold below which BuildTree/UpDownPass stop spawning tasks.
    pub nspawn: usize,
    /// MAC parameter; smaller is more accurate and more expensive.
    pub theta: f64,
    /// Periodic image depth; 0 means free space.
    pub images: u32,
    /// Recompute cell radius from the true extent of its bodies during the upward pass.
    pub use_rmax: bool,
    /// Contract cell radius toward the tightest sphere enclosing its children.
    pub use_ropt: bool,
    /// Symmetric (two-sided) P2P during traversal.
    pub mutual: bool,
    /// Use a single grafted global tree instead of per-peer LET traversal.
    pub graft: bool,
    /// Body ingest mode.
    pub distribution: Distribution,
    /// Rayon thread count; `None` uses the global default pool.
    pub thread_count: Option<usize>,
    /// Number of bodies sampled for optional direct-sum verification.
    pub num_targets: usize,
    /// Relative-L2 tolerance verification must meet to avoid `FmmError::Accuracy`.
    pub accuracy_tolerance: f64,
    /// Post-migration per-rank body count above which `Partition` fails with
    /// `FmmError::Imbalance`.
    pub imbalance_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ncrit: 32,
            nspawn: 1000,
            theta: 0.4,
            images: 0,
            use_rmax: false,
            use_ropt: false,
            mutual: true,
            graft: false,
            distribution: Distribution::default(),
            thread_count: None,
            num_targets: 100,
            accuracy_tolerance: 1e-2,
            imbalance_cap: usize::MAX,
        }
    }
}

impl Config {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FmmResult<Config> {
        let text = fs::read_to_string(path)
            .map_err(|e| FmmError::Internal(format!("failed to read config: {}", e)))?;
        serde_json::from_str(&text)
            .map_err(|e| FmmError::Internal(format!("failed to parse config: {}", e)))
    }

    pub fn to_json_string(&self) -> FmmResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FmmError::Internal(format!("failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_spec_table() {
        let config = Config::default();
        assert_eq!(config.ncrit, 32);
        assert_eq!(config.nspawn, 1000);
        assert!((config.theta - 0.4).abs() < 1e-12);
        assert_eq!(config.images, 0);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = Config::default();
        config.ncrit = 64;
        config.theta = 0.3;

        let text = config.to_json_string().unwrap();
        let parsed: Config = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed.ncrit, 64);
        assert!((parsed.theta - 0.3).abs() < 1e-12);
    }
}
