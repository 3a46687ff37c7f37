//! Structure file parsers

pub mod cif;
pub mod symmetry;

pub use cif::{parse_cif_file, parse_cif_str};
pub use symmetry::SymOp;
