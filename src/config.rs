//! Configuration for graph construction and batch loading
//!
//! `GraphConfig` controls how a single crystal is turned into a graph,
//! `LoaderConfig` controls how dataset indices are grouped into batches.

use crate::error::{DataError, Result};

/// How graphs for a batch are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Featurize on the calling thread (default)
    #[default]
    Sequential,
    /// Featurize on a rayon worker pool; `0` threads means one per core
    Parallel { num_threads: usize },
}

impl ExecutionMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel { num_threads: 0 }),
            _ => Err(DataError::Config(format!(
                "Invalid execution mode: {}. Must be 'sequential' or 'parallel'",
                s
            ))),
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel { .. } => "parallel",
        }
    }
}

/// Graph construction parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Maximum number of neighbors kept per atom
    pub max_num_nbr: usize,
    /// Cutoff radius for the neighbor search (Angstroms)
    pub radius: f64,
    /// First Gaussian center
    pub dmin: f64,
    /// Spacing between Gaussian centers
    pub step: f64,
    /// Gaussian width; `None` uses `step`
    pub variance: Option<f64>,
    /// Seed for the one-time record shuffle; `None` keeps source order
    pub random_seed: Option<u64>,
    /// Bound on cached graphs; `None` caches every graph
    pub cache_capacity: Option<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_num_nbr: 12,
            radius: 8.0,
            dmin: 0.0,
            step: 0.2,
            variance: None,
            random_seed: Some(123),
            cache_capacity: None,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_num_nbr == 0 {
            return Err(DataError::Config("max_num_nbr must be positive".into()));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(DataError::Config(format!(
                "radius must be a positive finite number, got {}",
                self.radius
            )));
        }
        if self.cache_capacity == Some(0) {
            return Err(DataError::Config("cache_capacity must be positive".into()));
        }
        // The expander checks dmin/step/variance against dmax = radius
        Ok(())
    }
}

/// Batch loading parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    /// Drop the final short batch. Forces `shuffle` on.
    pub drop_remainder: bool,
    /// Seed for per-epoch shuffling; `None` draws from entropy
    pub seed: Option<u64>,
    pub execution: ExecutionMode,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            drop_remainder: false,
            seed: None,
            execution: ExecutionMode::Sequential,
        }
    }
}
