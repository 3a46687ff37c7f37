//! Batch loader over a `CrystalDataset`
//!
//! Typical epoch loop:
//!
//! ```no_run
//! use std::sync::Arc;
//! use cgcnn_data::{CrystalDataset, DataLoader, GraphConfig, LoaderConfig};
//!
//! # fn main() -> cgcnn_data::Result<()> {
//! let dataset = Arc::new(CrystalDataset::from_directory("data/", &GraphConfig::default())?);
//! let mut loader = DataLoader::new(dataset, &LoaderConfig { batch_size: 64, ..Default::default() })?;
//! for _ in 0..10 {
//!     for batch in loader.epoch() {
//!         let batch = batch?;
//!         println!("{} crystals, {} atoms", batch.num_crystals(), batch.num_atoms);
//!     }
//!     loader.on_epoch_end();
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::data::collate::{collate, Batch};
use crate::data::dataset::CrystalDataset;
use crate::data::resolver::{resolver_for, GraphResolver};
use crate::data::sampler::BatchSampler;
use crate::error::Result;

pub struct DataLoader {
    dataset: Arc<CrystalDataset>,
    sampler: BatchSampler,
    resolver: Box<dyn GraphResolver>,
}

impl DataLoader {
    pub fn new(dataset: Arc<CrystalDataset>, config: &LoaderConfig) -> Result<Self> {
        let resolver = resolver_for(config.execution)?;
        Self::with_resolver(dataset, config, resolver)
    }

    pub fn with_resolver(
        dataset: Arc<CrystalDataset>,
        config: &LoaderConfig,
        resolver: Box<dyn GraphResolver>,
    ) -> Result<Self> {
        let sampler = BatchSampler::from_config(dataset.len(), config)?;
        log::info!(
            "Data loader: {} batches of {} ({} resolver, shuffle={}, drop_remainder={})",
            sampler.len(),
            sampler.batch_size(),
            resolver.name(),
            sampler.shuffle(),
            sampler.drop_remainder()
        );
        Ok(Self {
            dataset,
            sampler,
            resolver,
        })
    }

    /// Batches per epoch
    pub fn len(&self) -> usize {
        self.sampler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sampler.is_empty()
    }

    pub fn dataset(&self) -> &Arc<CrystalDataset> {
        &self.dataset
    }

    pub fn sampler(&self) -> &BatchSampler {
        &self.sampler
    }

    /// Collated batch `batch_number` of the current epoch
    pub fn get(&self, batch_number: usize) -> Result<Batch> {
        let indices = self.sampler.get_batch_indices(batch_number)?;
        log::debug!("Resolving batch {} ({} crystals)", batch_number, indices.len());
        let graphs = self.resolver.resolve(&self.dataset, indices)?;
        collate(&graphs)
    }

    /// Repartition the indices for the next epoch
    pub fn on_epoch_end(&mut self) {
        self.sampler.reset();
    }

    /// Iterate over the batches of the current epoch in order
    pub fn epoch(&self) -> Epoch<'_> {
        Epoch {
            loader: self,
            next: 0,
        }
    }
}

pub struct Epoch<'a> {
    loader: &'a DataLoader,
    next: usize,
}

impl Iterator for Epoch<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.loader.len() {
            return None;
        }
        let batch = self.loader.get(self.next);
        self.next += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.loader.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Epoch<'_> {}
