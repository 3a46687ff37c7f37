//! Crystal graph construction

pub mod builder;

pub use builder::{CrystalGraph, CrystalGraphBuilder, PADDING_INDEX};
