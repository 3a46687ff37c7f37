//! Batch collation
//!
//! Concatenates per-crystal graphs along the atom axis. Neighbor indices are
//! shifted by the number of atoms of all preceding crystals so they stay
//! valid in the merged graph, and `crystal_atom_index` records which global
//! atom range belongs to which crystal.
//!
//! For a batch of k crystals with atom counts n_0..n_{k-1} and N = sum(n_i):
//!
//! - `atom_features`: (N, atom_fea_len)
//! - `neighbor_features`: (N, M, nbr_fea_len)
//! - `neighbor_index`: (N, M)
//! - `crystal_atom_index`: k ranges, range i = [sum(n_j, j<i), sum(n_j, j<=i))
//! - `targets`: (k, 1)

use std::ops::Range;

use crate::error::{DataError, Result};
use crate::graph::CrystalGraph;

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub num_atoms: usize,
    pub max_num_nbr: usize,
    pub atom_fea_len: usize,
    pub nbr_fea_len: usize,
    pub atom_features: Vec<f64>,
    pub neighbor_features: Vec<f64>,
    pub neighbor_index: Vec<usize>,
    pub crystal_atom_index: Vec<Range<usize>>,
    /// One target per crystal
    pub targets: Vec<f64>,
    pub ids: Vec<String>,
}

impl Batch {
    pub fn num_crystals(&self) -> usize {
        self.crystal_atom_index.len()
    }
}

/// Merge graphs into one batch, preserving their order
///
/// Accepts anything that derefs to a graph (`&CrystalGraph`,
/// `Arc<CrystalGraph>`), so cached graphs need not be cloned first.
pub fn collate<G: AsRef<CrystalGraph>>(graphs: &[G]) -> Result<Batch> {
    let first = graphs
        .first()
        .ok_or_else(|| DataError::Shape("Cannot collate an empty batch".into()))?
        .as_ref();
    let (m, atom_fea_len, nbr_fea_len) = (first.max_num_nbr, first.atom_fea_len, first.nbr_fea_len);

    let total_atoms: usize = graphs.iter().map(|g| g.as_ref().num_atoms).sum();

    let mut batch = Batch {
        num_atoms: total_atoms,
        max_num_nbr: m,
        atom_fea_len,
        nbr_fea_len,
        atom_features: Vec::with_capacity(total_atoms * atom_fea_len),
        neighbor_features: Vec::with_capacity(total_atoms * m * nbr_fea_len),
        neighbor_index: Vec::with_capacity(total_atoms * m),
        crystal_atom_index: Vec::with_capacity(graphs.len()),
        targets: Vec::with_capacity(graphs.len()),
        ids: Vec::with_capacity(graphs.len()),
    };

    let mut base_idx = 0;
    for graph in graphs {
        let graph = graph.as_ref();
        if (graph.max_num_nbr, graph.atom_fea_len, graph.nbr_fea_len) != (m, atom_fea_len, nbr_fea_len)
        {
            return Err(DataError::Shape(format!(
                "{} has (M={}, atom_fea_len={}, nbr_fea_len={}), batch expects ({}, {}, {})",
                graph.id,
                graph.max_num_nbr,
                graph.atom_fea_len,
                graph.nbr_fea_len,
                m,
                atom_fea_len,
                nbr_fea_len
            )));
        }
        graph.check_shapes()?;

        let n_i = graph.num_atoms;
        batch.atom_features.extend_from_slice(&graph.atom_features);
        batch.neighbor_features.extend_from_slice(&graph.neighbor_features);
        batch
            .neighbor_index
            .extend(graph.neighbor_index.iter().map(|&j| j + base_idx));
        batch.crystal_atom_index.push(base_idx..base_idx + n_i);
        batch.targets.push(graph.target);
        batch.ids.push(graph.id.clone());
        base_idx += n_i;
    }

    log::debug!(
        "Collated {} crystals, {} atoms",
        batch.num_crystals(),
        batch.num_atoms
    );

    Ok(batch)
}
