//! Indexable dataset of crystal graphs
//!
//! Records are shuffled once at construction with a fixed seed. Graphs are
//! built on first access and cached by index.
//!
//! Directory layout for `from_directory`:
//!
//! ```text
//! root_dir
//! ├── id_prop.csv
//! ├── atom_init.json
//! ├── id0.cif
//! ├── id1.cif
//! └── ...
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::GraphConfig;
use crate::data::cache::GraphCache;
use crate::data::records::{read_id_prop, CrystalRecord, RecordTable};
use crate::error::{DataError, Result};
use crate::features::AtomFeatureTable;
use crate::graph::{CrystalGraph, CrystalGraphBuilder};

pub const ID_PROP_FILE: &str = "id_prop.csv";
pub const ATOM_INIT_FILE: &str = "atom_init.json";
pub const STRUCTURE_EXTENSION: &str = "cif";

pub struct CrystalDataset {
    records: Vec<CrystalRecord>,
    builder: CrystalGraphBuilder,
    cache: Mutex<GraphCache>,
}

impl CrystalDataset {
    /// Load `id_prop.csv`, `atom_init.json` and per-id CIF files from a directory
    pub fn from_directory<P: AsRef<Path>>(root_dir: P, config: &GraphConfig) -> Result<Self> {
        let root = root_dir.as_ref();
        if !root.is_dir() {
            return Err(DataError::Config(format!(
                "root_dir does not exist: {}",
                root.display()
            )));
        }
        let id_prop = require_file(root, ID_PROP_FILE)?;
        let atom_init = require_file(root, ATOM_INIT_FILE)?;

        let records = read_id_prop(&id_prop, root, STRUCTURE_EXTENSION)?;
        let atom_table = Arc::new(AtomFeatureTable::from_file(&atom_init)?);
        Self::from_records(records, atom_table, config)
    }

    /// Build from an in-memory table with `id`, `target` and `cif` columns
    pub fn from_table<P: AsRef<Path>>(
        table: &RecordTable,
        atom_init: P,
        config: &GraphConfig,
    ) -> Result<Self> {
        let atom_init = atom_init.as_ref();
        if !atom_init.is_file() {
            return Err(DataError::Config(format!(
                "{} does not exist",
                atom_init.display()
            )));
        }
        let records = table.records()?;
        let atom_table = Arc::new(AtomFeatureTable::from_file(atom_init)?);
        Self::from_records(records, atom_table, config)
    }

    pub fn from_records(
        records: Vec<CrystalRecord>,
        atom_table: Arc<AtomFeatureTable>,
        config: &GraphConfig,
    ) -> Result<Self> {
        let builder = CrystalGraphBuilder::new(atom_table, config)?;
        Ok(Self::with_builder(records, builder, config))
    }

    /// Use a preconfigured builder, e.g. one with a custom neighbor search
    pub fn with_builder(
        mut records: Vec<CrystalRecord>,
        builder: CrystalGraphBuilder,
        config: &GraphConfig,
    ) -> Self {
        if let Some(seed) = config.random_seed {
            let mut rng = StdRng::seed_from_u64(seed);
            records.shuffle(&mut rng);
        }

        log::info!(
            "Crystal dataset: {} records, radius={}, max_num_nbr={}, atom_fea_len={}, nbr_fea_len={}",
            records.len(),
            builder.radius(),
            builder.max_num_nbr(),
            builder.atom_fea_len(),
            builder.nbr_fea_len()
        );

        Self {
            records,
            builder,
            cache: Mutex::new(GraphCache::new(config.cache_capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<&CrystalRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[CrystalRecord] {
        &self.records
    }

    pub fn builder(&self) -> &CrystalGraphBuilder {
        &self.builder
    }

    /// `(atom_fea_len, nbr_fea_len)` for sizing a model
    pub fn feature_dims(&self) -> (usize, usize) {
        (self.builder.atom_fea_len(), self.builder.nbr_fea_len())
    }

    /// Graph for a dataset index, built on first access
    ///
    /// Failures are not cached; a later call retries the build.
    pub fn get(&self, index: usize) -> Result<Arc<CrystalGraph>> {
        let record = self.records.get(index).ok_or_else(|| {
            DataError::Lookup(format!(
                "Index {} out of range for dataset of {} records",
                index,
                self.records.len()
            ))
        })?;

        if let Some(graph) = self.lock_cache().get(index) {
            log::debug!("Cache hit for {} (index {})", record.id, index);
            return Ok(graph);
        }

        // Build outside the lock so parallel workers do not serialize
        let graph = Arc::new(self.builder.build_record(record)?);
        self.lock_cache().insert(index, Arc::clone(&graph));
        Ok(graph)
    }

    /// Number of graphs currently cached
    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> MutexGuard<'_, GraphCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_file(root: &Path, name: &str) -> Result<std::path::PathBuf> {
    let path = root.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(DataError::Config(format!("{} does not exist!", name)))
    }
}
