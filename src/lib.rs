//! CGCNN data pipeline
//!
//! Turns periodic crystal structures into fixed-width graph tensors for
//! crystal graph convolutional networks and groups them into training
//! batches.
//!
//! - `features`: per-element embedding table (`atom_init.json`)
//! - `geometry`: periodic neighbor search and Gaussian distance expansion
//! - `graph`: per-crystal graph construction
//! - `data`: dataset with graph cache, batch sampler, collation and loader
//!
//! With the `python` feature the crate also builds the `_cgcnn_data`
//! extension module exposing `CrystalDataLoader`.

pub mod chem;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod formats;
pub mod geometry;
pub mod graph;
pub mod structure;

#[cfg(feature = "python")]
mod py_loader;

pub use config::{ExecutionMode, GraphConfig, LoaderConfig};
pub use data::{
    collate, Batch, BatchSampler, CrystalDataset, CrystalRecord, DataLoader, GraphResolver,
    ParallelResolver, RecordTable, SequentialResolver,
};
pub use error::{DataError, Result};
pub use features::AtomFeatureTable;
pub use geometry::{GaussianDistance, NeighborFinder, PeriodicNeighborFinder};
pub use graph::{CrystalGraph, CrystalGraphBuilder, PADDING_INDEX};
pub use structure::{Crystal, Lattice};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition
#[cfg(feature = "python")]
#[pymodule]
fn _cgcnn_data(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_class::<py_loader::PyCrystalDataLoader>()?;
    Ok(())
}
