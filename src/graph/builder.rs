//! Crystal structure -> graph tensors
//!
//! Each atom becomes a node carrying its element features. Its edges are the
//! `max_num_nbr` closest atoms within the cutoff radius, each carrying the
//! Gaussian expansion of the bond length.
//!
//! Atoms with too few neighbors are padded: the missing slots point at atom
//! `PADDING_INDEX` and carry the distance `radius + 1`. The padded distance
//! is the only thing telling a padded slot apart from a real bond to atom 0.

use std::sync::Arc;

use crate::config::GraphConfig;
use crate::data::records::CrystalRecord;
use crate::error::{DataError, Result};
use crate::features::AtomFeatureTable;
use crate::geometry::{GaussianDistance, NeighborFinder, PeriodicNeighborFinder};
use crate::structure::Crystal;

/// Neighbor index written into padded slots
pub const PADDING_INDEX: usize = 0;

/// Graph tensors of one crystal, stored flat in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct CrystalGraph {
    pub id: String,
    pub target: f64,
    pub num_atoms: usize,
    pub max_num_nbr: usize,
    pub atom_fea_len: usize,
    pub nbr_fea_len: usize,
    /// (num_atoms, atom_fea_len)
    pub atom_features: Vec<f64>,
    /// (num_atoms, max_num_nbr, nbr_fea_len)
    pub neighbor_features: Vec<f64>,
    /// (num_atoms, max_num_nbr)
    pub neighbor_index: Vec<usize>,
}

impl CrystalGraph {
    pub fn atom_features_of(&self, atom: usize) -> &[f64] {
        &self.atom_features[atom * self.atom_fea_len..(atom + 1) * self.atom_fea_len]
    }

    pub fn neighbors_of(&self, atom: usize) -> &[usize] {
        &self.neighbor_index[atom * self.max_num_nbr..(atom + 1) * self.max_num_nbr]
    }

    /// Expanded features of neighbor slot `slot` of `atom`
    pub fn bond_features_of(&self, atom: usize, slot: usize) -> &[f64] {
        let start = (atom * self.max_num_nbr + slot) * self.nbr_fea_len;
        &self.neighbor_features[start..start + self.nbr_fea_len]
    }

    /// Check that the flat buffers match the declared dimensions
    pub fn check_shapes(&self) -> Result<()> {
        let n = self.num_atoms;
        let checks = [
            ("atom_features", self.atom_features.len(), n * self.atom_fea_len),
            (
                "neighbor_features",
                self.neighbor_features.len(),
                n * self.max_num_nbr * self.nbr_fea_len,
            ),
            ("neighbor_index", self.neighbor_index.len(), n * self.max_num_nbr),
        ];
        for (name, actual, expected) in checks {
            if actual != expected {
                return Err(DataError::Shape(format!(
                    "{}: {} has {} values, expected {}",
                    self.id, name, actual, expected
                )));
            }
        }
        if let Some(&bad) = self.neighbor_index.iter().find(|&&j| j >= n.max(1)) {
            return Err(DataError::Shape(format!(
                "{}: neighbor index {} out of range for {} atoms",
                self.id, bad, n
            )));
        }
        Ok(())
    }
}

impl AsRef<CrystalGraph> for CrystalGraph {
    fn as_ref(&self) -> &CrystalGraph {
        self
    }
}

/// Builds `CrystalGraph`s with a fixed cutoff, neighbor count and filter bank
#[derive(Clone)]
pub struct CrystalGraphBuilder {
    atom_table: Arc<AtomFeatureTable>,
    gdf: GaussianDistance,
    radius: f64,
    max_num_nbr: usize,
    finder: Arc<dyn NeighborFinder>,
}

impl std::fmt::Debug for CrystalGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrystalGraphBuilder")
            .field("radius", &self.radius)
            .field("max_num_nbr", &self.max_num_nbr)
            .field("atom_fea_len", &self.atom_table.feature_len())
            .field("nbr_fea_len", &self.gdf.len())
            .finish()
    }
}

impl CrystalGraphBuilder {
    /// The Gaussian filter spans `[dmin, radius]`
    pub fn new(atom_table: Arc<AtomFeatureTable>, config: &GraphConfig) -> Result<Self> {
        config.validate()?;
        let gdf = GaussianDistance::new(config.dmin, config.radius, config.step, config.variance)?;
        Ok(Self {
            atom_table,
            gdf,
            radius: config.radius,
            max_num_nbr: config.max_num_nbr,
            finder: Arc::new(PeriodicNeighborFinder),
        })
    }

    /// Replace the neighbor search
    pub fn with_neighbor_finder(mut self, finder: Arc<dyn NeighborFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn max_num_nbr(&self) -> usize {
        self.max_num_nbr
    }

    pub fn atom_fea_len(&self) -> usize {
        self.atom_table.feature_len()
    }

    pub fn nbr_fea_len(&self) -> usize {
        self.gdf.len()
    }

    pub fn gaussian(&self) -> &GaussianDistance {
        &self.gdf
    }

    pub fn atom_table(&self) -> &Arc<AtomFeatureTable> {
        &self.atom_table
    }

    /// Load a record's structure and build its graph
    pub fn build_record(&self, record: &CrystalRecord) -> Result<CrystalGraph> {
        let crystal = record.source.load().map_err(|e| match e {
            DataError::Parse(msg) => DataError::Parse(format!("{}: {}", record.id, msg)),
            other => other,
        })?;
        self.build(&crystal, &record.id, record.target)
    }

    pub fn build(&self, crystal: &Crystal, id: &str, target: f64) -> Result<CrystalGraph> {
        let num_atoms = crystal.num_atoms();
        let m = self.max_num_nbr;

        let mut atom_features = Vec::with_capacity(num_atoms * self.atom_fea_len());
        for &z in &crystal.species {
            let features = self.atom_table.feature_of(z).map_err(|e| match e {
                DataError::Lookup(msg) => DataError::Lookup(format!("{}: {}", id, msg)),
                other => other,
            })?;
            atom_features.extend_from_slice(features);
        }

        let mut all_nbrs = self.finder.all_neighbors(crystal, self.radius);
        if all_nbrs.len() != num_atoms {
            return Err(DataError::Shape(format!(
                "{}: neighbor search returned {} lists for {} atoms",
                id,
                all_nbrs.len(),
                num_atoms
            )));
        }

        let padding_distance = self.radius + 1.0;
        let mut neighbor_index = Vec::with_capacity(num_atoms * m);
        let mut distances = Vec::with_capacity(num_atoms * m);
        let mut padded_atoms = 0;

        for nbrs in all_nbrs.iter_mut() {
            nbrs.sort_by(|a, b| a.distance.total_cmp(&b.distance));

            let kept = nbrs.len().min(m);
            for nbr in &nbrs[..kept] {
                if nbr.index >= num_atoms {
                    return Err(DataError::Shape(format!(
                        "{}: neighbor index {} out of range for {} atoms",
                        id, nbr.index, num_atoms
                    )));
                }
                neighbor_index.push(nbr.index);
                distances.push(nbr.distance);
            }

            if kept < m {
                padded_atoms += 1;
                neighbor_index.extend(std::iter::repeat(PADDING_INDEX).take(m - kept));
                distances.extend(std::iter::repeat(padding_distance).take(m - kept));
            }
        }

        if padded_atoms > 0 {
            log::warn!(
                "{} did not find enough neighbors to build graph ({} of {} atoms padded). \
                 If it happens frequently, consider increasing radius.",
                id,
                padded_atoms,
                num_atoms
            );
        }

        let neighbor_features = self.gdf.expand_all(&distances);

        Ok(CrystalGraph {
            id: id.to_string(),
            target,
            num_atoms,
            max_num_nbr: m,
            atom_fea_len: self.atom_fea_len(),
            nbr_fea_len: self.nbr_fea_len(),
            atom_features,
            neighbor_features,
            neighbor_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::StructureSource;
    use crate::geometry::Neighbor;
    use crate::structure::Lattice;

    fn table() -> Arc<AtomFeatureTable> {
        Arc::new(
            AtomFeatureTable::from_json_str(r#"{"26": [1.0, 0.0], "29": [0.0, 1.0]}"#).unwrap(),
        )
    }

    fn simple_cubic(a: f64) -> Crystal {
        let lattice = Lattice::from_parameters(a, a, a, 90.0, 90.0, 90.0);
        Crystal::new(lattice, vec![29], vec![[0.0, 0.0, 0.0]]).unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, b) in actual.iter().zip(expected) {
            assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    fn config(radius: f64, max_num_nbr: usize) -> GraphConfig {
        GraphConfig {
            radius,
            max_num_nbr,
            ..Default::default()
        }
    }

    #[test]
    fn test_shapes() {
        let builder = CrystalGraphBuilder::new(table(), &config(6.0, 12)).unwrap();
        let lattice = Lattice::from_parameters(2.87, 2.87, 2.87, 90.0, 90.0, 90.0);
        let crystal =
            Crystal::new(lattice, vec![26, 29], vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]).unwrap();

        let graph = builder.build(&crystal, "bcc", 1.5).unwrap();
        assert_eq!(graph.num_atoms, 2);
        assert_eq!(graph.atom_fea_len, 2);
        assert_eq!(graph.nbr_fea_len, 31);
        assert_eq!(graph.atom_features, vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(graph.neighbor_index.len(), 2 * 12);
        assert_eq!(graph.neighbor_features.len(), 2 * 12 * 31);
        assert_eq!(graph.target, 1.5);
        assert_eq!(graph.id, "bcc");
        graph.check_shapes().unwrap();
    }

    #[test]
    fn test_padding_with_too_few_neighbors() {
        // 6 neighbors at 5.0 within a 6.0 cutoff, 8 slots
        let builder = CrystalGraphBuilder::new(table(), &config(6.0, 8)).unwrap();
        let graph = builder.build(&simple_cubic(5.0), "sc", 0.0).unwrap();

        assert_eq!(graph.neighbors_of(0), &[0; 8]);
        let padded = builder.gaussian().expand(7.0);
        let real = builder.gaussian().expand(5.0);
        for slot in 0..6 {
            assert_close(graph.bond_features_of(0, slot), &real);
        }
        for slot in 6..8 {
            assert_eq!(graph.bond_features_of(0, slot), padded.as_slice());
            assert!(graph.bond_features_of(0, slot).iter().all(|&v| v < 1e-10));
        }
    }

    #[test]
    fn test_truncation_keeps_closest() {
        // 6 neighbors at 5.0 and 12 at 7.07 within 8.0; keep 12
        let builder = CrystalGraphBuilder::new(table(), &config(8.0, 12)).unwrap();
        let graph = builder.build(&simple_cubic(5.0), "sc", 0.0).unwrap();

        let near = builder.gaussian().expand(5.0);
        let far = builder.gaussian().expand(50f64.sqrt());
        for slot in 0..6 {
            assert_close(graph.bond_features_of(0, slot), &near);
        }
        for slot in 6..12 {
            assert_close(graph.bond_features_of(0, slot), &far);
        }
    }

    #[test]
    fn test_unknown_element_is_lookup_error() {
        let builder = CrystalGraphBuilder::new(table(), &config(6.0, 8)).unwrap();
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let crystal = Crystal::new(lattice, vec![8], vec![[0.0, 0.0, 0.0]]).unwrap();
        assert!(matches!(
            builder.build(&crystal, "oxygen", 0.0),
            Err(DataError::Lookup(_))
        ));
    }

    #[test]
    fn test_malformed_source_is_parse_error() {
        let builder = CrystalGraphBuilder::new(table(), &config(6.0, 8)).unwrap();
        let record = CrystalRecord::new("bad", 0.0, StructureSource::Inline("data_x\n".into()));
        assert!(matches!(
            builder.build_record(&record),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let bad = GraphConfig {
            radius: 0.1,
            step: 0.2,
            ..Default::default()
        };
        assert!(matches!(
            CrystalGraphBuilder::new(table(), &bad),
            Err(DataError::Config(_))
        ));
    }

    struct FixedNeighbors(Vec<Vec<Neighbor>>);

    impl NeighborFinder for FixedNeighbors {
        fn all_neighbors(&self, _crystal: &Crystal, _radius: f64) -> Vec<Vec<Neighbor>> {
            self.0.clone()
        }
    }

    #[test]
    fn test_neighbors_sorted_by_distance() {
        let finder = FixedNeighbors(vec![vec![
            Neighbor {
                distance: 3.0,
                index: 0,
            },
            Neighbor {
                distance: 1.0,
                index: 0,
            },
            Neighbor {
                distance: 2.0,
                index: 0,
            },
        ]]);
        let builder = CrystalGraphBuilder::new(table(), &config(6.0, 2))
            .unwrap()
            .with_neighbor_finder(Arc::new(finder));
        let graph = builder.build(&simple_cubic(5.0), "sc", 0.0).unwrap();

        assert_eq!(graph.bond_features_of(0, 0), builder.gaussian().expand(1.0).as_slice());
        assert_eq!(graph.bond_features_of(0, 1), builder.gaussian().expand(2.0).as_slice());
    }

    #[test]
    fn test_bad_neighbor_search_is_shape_error() {
        let builder = CrystalGraphBuilder::new(table(), &config(6.0, 2))
            .unwrap()
            .with_neighbor_finder(Arc::new(FixedNeighbors(vec![])));
        assert!(matches!(
            builder.build(&simple_cubic(5.0), "sc", 0.0),
            Err(DataError::Shape(_))
        ));
    }
}
