//! Per-atom feature tables

pub mod atom_init;

pub use atom_init::AtomFeatureTable;
