//! Crystal structure model
//!
//! A `Crystal` is a periodic cell plus an ordered list of sites. The site
//! order is the atom identity used by every downstream tensor.

pub mod lattice;

pub use lattice::Lattice;

use std::path::Path;

use crate::error::{DataError, Result};
use crate::formats::cif;

#[derive(Debug, Clone, PartialEq)]
pub struct Crystal {
    pub lattice: Lattice,
    /// Atomic number per site
    pub species: Vec<u32>,
    /// Fractional coordinates per site
    pub frac_coords: Vec<[f64; 3]>,
}

impl Crystal {
    pub fn new(lattice: Lattice, species: Vec<u32>, frac_coords: Vec<[f64; 3]>) -> Result<Self> {
        if species.len() != frac_coords.len() {
            return Err(DataError::Parse(format!(
                "{} species for {} coordinates",
                species.len(),
                frac_coords.len()
            )));
        }
        if !lattice.is_valid() {
            return Err(DataError::Parse(format!(
                "Degenerate lattice: {:?}",
                lattice.matrix
            )));
        }
        if frac_coords.iter().flatten().any(|x| !x.is_finite()) {
            return Err(DataError::Parse("Non-finite fractional coordinate".into()));
        }
        Ok(Self {
            lattice,
            species,
            frac_coords,
        })
    }

    /// Parse a crystal from CIF text
    pub fn from_cif_str(text: &str) -> Result<Self> {
        cif::parse_cif_str(text)
    }

    /// Parse a crystal from a CIF file on disk
    pub fn from_cif_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        cif::parse_cif_file(path)
    }

    pub fn num_atoms(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Cartesian coordinates of every site (Angstroms)
    pub fn cart_coords(&self) -> Vec<[f64; 3]> {
        self.frac_coords
            .iter()
            .map(|f| self.lattice.to_cartesian(f))
            .collect()
    }
}
