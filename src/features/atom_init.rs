//! Atom feature table loaded from `atom_init.json`
//!
//! The JSON object maps atomic numbers (as strings) to equal-length numeric
//! arrays, e.g. `{"1": [0, 1, 0.5], "8": [1, 0, 0.25]}`. One table is shared
//! by every crystal of a dataset and is immutable once loaded.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde_json::Value;

use crate::error::{DataError, Result};

#[derive(Debug, Default)]
struct DecodeTables {
    /// Row index -> atomic number, ascending
    by_index: Vec<u32>,
    /// Feature vector bits -> atomic number
    by_features: HashMap<Vec<u64>, u32>,
}

#[derive(Debug)]
pub struct AtomFeatureTable {
    embedding: BTreeMap<u32, Vec<f64>>,
    feature_len: usize,
    decode: OnceLock<DecodeTables>,
}

impl AtomFeatureTable {
    /// Load the table from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DataError::Config(format!("Cannot read atom features {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text).map_err(|e| match e {
            DataError::Config(msg) => DataError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse the table from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DataError::Config(format!("Malformed atom feature JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| DataError::Config("Atom feature JSON must be an object".into()))?;

        let mut embedding = BTreeMap::new();
        for (key, entry) in object {
            let atomic_number = parse_atomic_number(key)?;
            let values = entry.as_array().ok_or_else(|| {
                DataError::Config(format!("Features for element {} are not an array", key))
            })?;
            let features = values
                .iter()
                .map(|v| {
                    v.as_f64().ok_or_else(|| {
                        DataError::Config(format!(
                            "Non-numeric feature {} for element {}",
                            v, key
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            embedding.insert(atomic_number, features);
        }

        Self::from_state_dict(embedding)
    }

    /// Build the table from an in-memory mapping
    pub fn from_state_dict(embedding: BTreeMap<u32, Vec<f64>>) -> Result<Self> {
        let feature_len = match embedding.values().next() {
            Some(first) => first.len(),
            None => return Err(DataError::Config("Atom feature table is empty".into())),
        };
        if feature_len == 0 {
            return Err(DataError::Config("Atom feature vectors are empty".into()));
        }
        if let Some((z, features)) = embedding.iter().find(|(_, f)| f.len() != feature_len) {
            return Err(DataError::Config(format!(
                "Element {} has {} features, expected {}",
                z,
                features.len(),
                feature_len
            )));
        }
        if embedding.contains_key(&0) {
            return Err(DataError::Config("Atomic number 0 is not valid".into()));
        }

        Ok(Self {
            embedding,
            feature_len,
            decode: OnceLock::new(),
        })
    }

    /// Export the mapping
    pub fn state_dict(&self) -> &BTreeMap<u32, Vec<f64>> {
        &self.embedding
    }

    /// Feature vector for an atomic number
    pub fn feature_of(&self, atomic_number: u32) -> Result<&[f64]> {
        self.embedding
            .get(&atomic_number)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                DataError::Lookup(format!(
                    "Element {} is not in the atom feature table",
                    atomic_number
                ))
            })
    }

    pub fn contains(&self, atomic_number: u32) -> bool {
        self.embedding.contains_key(&atomic_number)
    }

    /// Atomic numbers present in the table, ascending
    pub fn atom_types(&self) -> impl Iterator<Item = u32> + '_ {
        self.embedding.keys().copied()
    }

    /// Length of every feature vector
    pub fn feature_len(&self) -> usize {
        self.feature_len
    }

    pub fn len(&self) -> usize {
        self.embedding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embedding.is_empty()
    }

    /// Row index of an atomic number (ascending atomic-number order)
    pub fn index_of(&self, atomic_number: u32) -> Result<usize> {
        self.decode_tables()
            .by_index
            .binary_search(&atomic_number)
            .map_err(|_| {
                DataError::Lookup(format!(
                    "Element {} is not in the atom feature table",
                    atomic_number
                ))
            })
    }

    /// Atomic number stored at a row index
    pub fn decode(&self, index: usize) -> Result<u32> {
        self.decode_tables()
            .by_index
            .get(index)
            .copied()
            .ok_or_else(|| {
                DataError::Lookup(format!(
                    "Index {} is out of range for {} atom types",
                    index,
                    self.len()
                ))
            })
    }

    /// Atomic number whose stored feature vector equals `features` exactly
    pub fn decode_features(&self, features: &[f64]) -> Result<u32> {
        let key: Vec<u64> = features.iter().map(|f| f.to_bits()).collect();
        self.decode_tables()
            .by_features
            .get(&key)
            .copied()
            .ok_or_else(|| DataError::Lookup("Feature vector not in the atom feature table".into()))
    }

    fn decode_tables(&self) -> &DecodeTables {
        self.decode.get_or_init(|| {
            log::debug!("Building reverse lookup for {} atom types", self.len());
            DecodeTables {
                by_index: self.embedding.keys().copied().collect(),
                by_features: self
                    .embedding
                    .iter()
                    .map(|(&z, features)| (features.iter().map(|f| f.to_bits()).collect(), z))
                    .collect(),
            }
        })
    }
}

fn parse_atomic_number(key: &str) -> Result<u32> {
    match key.trim().parse::<u32>() {
        Ok(z) if z > 0 => Ok(z),
        _ => Err(DataError::Config(format!(
            "Atom feature key '{}' is not a positive atomic number",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{"8": [1, 0, 0.25], "1": [0, 1, 0.5], "26": [0, 0, 1]}"#;

    #[test]
    fn test_load_and_lookup() {
        let table = AtomFeatureTable::from_json_str(TABLE).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.feature_len(), 3);
        assert_eq!(table.feature_of(8).unwrap(), &[1.0, 0.0, 0.25]);
        assert_eq!(table.atom_types().collect::<Vec<_>>(), vec![1, 8, 26]);
    }

    #[test]
    fn test_unknown_element() {
        let table = AtomFeatureTable::from_json_str(TABLE).unwrap();
        assert!(matches!(table.feature_of(6), Err(DataError::Lookup(_))));
        assert!(!table.contains(6));
    }

    #[test]
    fn test_decode_round_trip() {
        let table = AtomFeatureTable::from_json_str(TABLE).unwrap();
        for z in table.atom_types().collect::<Vec<_>>() {
            let index = table.index_of(z).unwrap();
            assert_eq!(table.decode(index).unwrap(), z);
            let features = table.feature_of(z).unwrap().to_vec();
            assert_eq!(table.decode_features(&features).unwrap(), z);
        }
        assert!(matches!(table.decode(3), Err(DataError::Lookup(_))));
        assert!(table.decode_features(&[9.0, 9.0, 9.0]).is_err());
    }

    #[test]
    fn test_state_dict_round_trip() {
        let table = AtomFeatureTable::from_json_str(TABLE).unwrap();
        let copy = AtomFeatureTable::from_state_dict(table.state_dict().clone()).unwrap();
        assert_eq!(copy.state_dict(), table.state_dict());
    }

    #[test]
    fn test_malformed_sources() {
        let cases = [
            "not json",
            "[1, 2, 3]",
            r#"{"x": [1.0]}"#,
            r#"{"0": [1.0]}"#,
            r#"{"1": 3.0}"#,
            r#"{"1": ["a"]}"#,
            r#"{"1": [1.0], "2": [1.0, 2.0]}"#,
            r#"{"1": []}"#,
            "{}",
        ];
        for case in cases {
            assert!(
                matches!(AtomFeatureTable::from_json_str(case), Err(DataError::Config(_))),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_missing_file() {
        let result = AtomFeatureTable::from_file("/nonexistent/atom_init.json");
        assert!(matches!(result, Err(DataError::Config(_))));
    }
}
