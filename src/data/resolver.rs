//! Graph resolution strategies for a batch of dataset indices
//!
//! Both resolvers return graphs in the order of the requested indices and
//! fail with the first error encountered, so a batch is identical whichever
//! strategy produced it.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::ExecutionMode;
use crate::data::dataset::CrystalDataset;
use crate::error::{DataError, Result};
use crate::graph::CrystalGraph;

pub trait GraphResolver: Send + Sync {
    fn resolve(&self, dataset: &CrystalDataset, indices: &[usize])
        -> Result<Vec<Arc<CrystalGraph>>>;

    fn name(&self) -> &'static str;
}

/// Builds graphs one at a time on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialResolver;

impl GraphResolver for SequentialResolver {
    fn resolve(
        &self,
        dataset: &CrystalDataset,
        indices: &[usize],
    ) -> Result<Vec<Arc<CrystalGraph>>> {
        indices.iter().map(|&i| dataset.get(i)).collect()
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// Builds the graphs of a batch concurrently on a dedicated rayon pool
pub struct ParallelResolver {
    pool: ThreadPool,
}

impl ParallelResolver {
    /// `num_threads == 0` lets rayon pick one thread per core
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("cgcnn-featurize-{}", i))
            .build()
            .map_err(|e| DataError::Config(format!("Failed to build thread pool: {}", e)))?;
        log::info!("Parallel featurization on {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for ParallelResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelResolver")
            .field("num_threads", &self.num_threads())
            .finish()
    }
}

impl GraphResolver for ParallelResolver {
    fn resolve(
        &self,
        dataset: &CrystalDataset,
        indices: &[usize],
    ) -> Result<Vec<Arc<CrystalGraph>>> {
        // Indexed collect keeps the input order
        self.pool
            .install(|| indices.par_iter().map(|&i| dataset.get(i)).collect())
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}

pub fn resolver_for(mode: ExecutionMode) -> Result<Box<dyn GraphResolver>> {
    match mode {
        ExecutionMode::Sequential => Ok(Box::new(SequentialResolver)),
        ExecutionMode::Parallel { num_threads } => Ok(Box::new(ParallelResolver::new(num_threads)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::{small_config, write_dataset};
    use std::fs;

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = write_dataset(9);
        let sequential = CrystalDataset::from_directory(dir.path(), &small_config()).unwrap();
        let parallel = CrystalDataset::from_directory(dir.path(), &small_config()).unwrap();
        let indices = [8, 3, 0, 5, 1, 7];

        let a = SequentialResolver.resolve(&sequential, &indices).unwrap();
        let b = ParallelResolver::new(4)
            .unwrap()
            .resolve(&parallel, &indices)
            .unwrap();

        assert_eq!(a.len(), indices.len());
        for ((ga, gb), &i) in a.iter().zip(&b).zip(&indices) {
            assert_eq!(ga.id, format!("c{}", i));
            assert_eq!(**ga, **gb);
        }
    }

    #[test]
    fn test_error_propagates() {
        let dir = write_dataset(4);
        fs::remove_file(dir.path().join("c2.cif")).unwrap();
        let dataset = CrystalDataset::from_directory(dir.path(), &small_config()).unwrap();

        assert!(SequentialResolver.resolve(&dataset, &[0, 2]).is_err());
        let parallel = ParallelResolver::new(2).unwrap();
        assert!(matches!(
            parallel.resolve(&dataset, &[0, 1, 2, 3]),
            Err(DataError::Io(_))
        ));
        assert!(parallel.resolve(&dataset, &[0, 1, 3]).is_ok());
    }

    #[test]
    fn test_resolver_for_mode() {
        assert_eq!(
            resolver_for(ExecutionMode::Sequential).unwrap().name(),
            "sequential"
        );
        let resolver = resolver_for(ExecutionMode::Parallel { num_threads: 2 }).unwrap();
        assert_eq!(resolver.name(), "parallel");
    }
}
