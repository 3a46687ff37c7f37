//! Partitioning of dataset indices into batches
//!
//! The partition is regenerated by `reset`, which the loader calls at the
//! start of every epoch. Dropping the remainder forces shuffling so that
//! the dropped tail differs between epochs.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::LoaderConfig;
use crate::error::{DataError, Result};

pub struct BatchSampler {
    dataset_len: usize,
    batch_size: usize,
    shuffle: bool,
    drop_remainder: bool,
    rng: StdRng,
    batches: Vec<Vec<usize>>,
}

impl BatchSampler {
    pub fn new(
        dataset_len: usize,
        batch_size: usize,
        shuffle: bool,
        drop_remainder: bool,
        seed: Option<u64>,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(DataError::Config("batch_size must be positive".into()));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut sampler = Self {
            dataset_len,
            batch_size,
            shuffle: shuffle || drop_remainder,
            drop_remainder,
            rng,
            batches: Vec::new(),
        };
        sampler.reset();
        Ok(sampler)
    }

    pub fn from_config(dataset_len: usize, config: &LoaderConfig) -> Result<Self> {
        Self::new(
            dataset_len,
            config.batch_size,
            config.shuffle,
            config.drop_remainder,
            config.seed,
        )
    }

    /// Number of batches per epoch
    pub fn len(&self) -> usize {
        if self.drop_remainder {
            self.dataset_len / self.batch_size
        } else {
            self.dataset_len.div_ceil(self.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Regenerate the partition for a new epoch
    pub fn reset(&mut self) {
        let mut indices: Vec<usize> = (0..self.dataset_len).collect();
        if self.shuffle {
            indices.shuffle(&mut self.rng);
        }

        self.batches = indices
            .chunks(self.batch_size)
            .filter(|chunk| !self.drop_remainder || chunk.len() == self.batch_size)
            .map(<[usize]>::to_vec)
            .collect();
    }

    pub fn get_batch_indices(&self, batch_number: usize) -> Result<&[usize]> {
        self.batches
            .get(batch_number)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                DataError::Lookup(format!(
                    "Batch {} out of range for {} batches",
                    batch_number,
                    self.batches.len()
                ))
            })
    }

    pub fn batches(&self) -> &[Vec<usize>] {
        &self.batches
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn drop_remainder(&self) -> bool {
        self.drop_remainder
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(sampler: &BatchSampler) -> Vec<usize> {
        sampler.batches().iter().map(Vec::len).collect()
    }

    #[test]
    fn test_keep_remainder() {
        let sampler = BatchSampler::new(17, 8, false, false, None).unwrap();
        assert_eq!(sampler.len(), 3);
        assert_eq!(sizes(&sampler), vec![8, 8, 1]);
        assert_eq!(sampler.get_batch_indices(2).unwrap(), &[16]);
        assert_eq!(
            sampler.get_batch_indices(0).unwrap(),
            &[0, 1, 2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn test_drop_remainder() {
        let sampler = BatchSampler::new(17, 8, false, true, Some(7)).unwrap();
        assert_eq!(sampler.len(), 2);
        assert_eq!(sizes(&sampler), vec![8, 8]);
        // Dropping the remainder turns shuffling on
        assert!(sampler.shuffle());
    }

    #[test]
    fn test_len_matches_partition() {
        for n in 0..30 {
            for batch_size in 1..7 {
                for drop in [false, true] {
                    let sampler = BatchSampler::new(n, batch_size, false, drop, Some(1)).unwrap();
                    assert_eq!(sampler.len(), sampler.batches().len());
                }
            }
        }
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut sampler = BatchSampler::new(50, 7, true, false, Some(42)).unwrap();
        for _ in 0..3 {
            let mut all: Vec<usize> = sampler.batches().iter().flatten().copied().collect();
            all.sort();
            assert_eq!(all, (0..50).collect::<Vec<_>>());
            sampler.reset();
        }
    }

    #[test]
    fn test_reset_reshuffles() {
        let mut sampler = BatchSampler::new(100, 10, true, false, Some(3)).unwrap();
        let first = sampler.batches().to_vec();
        sampler.reset();
        assert_ne!(first, sampler.batches());
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let a = BatchSampler::new(40, 5, true, false, Some(9)).unwrap();
        let b = BatchSampler::new(40, 5, true, false, Some(9)).unwrap();
        assert_eq!(a.batches(), b.batches());
    }

    #[test]
    fn test_invalid_batch_size_and_index() {
        assert!(matches!(
            BatchSampler::new(10, 0, false, false, None),
            Err(DataError::Config(_))
        ));
        let sampler = BatchSampler::new(10, 4, false, false, None).unwrap();
        assert!(matches!(
            sampler.get_batch_indices(3),
            Err(DataError::Lookup(_))
        ));
    }
}
