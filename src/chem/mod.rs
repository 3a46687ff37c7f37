//! Chemistry lookups for crystal structures

pub mod elements;

pub use elements::{atomic_number, infer_element};
