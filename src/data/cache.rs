//! Graph cache keyed by dataset index
//!
//! Unbounded by default. With a capacity the least recently used graph is
//! evicted first.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::graph::CrystalGraph;

pub struct GraphCache {
    /// Graph and last-use stamp per dataset index
    graphs: HashMap<usize, (Arc<CrystalGraph>, u64)>,
    /// Last-use stamp -> dataset index, oldest first. Only kept when bounded.
    order: BTreeMap<u64, usize>,
    clock: u64,
    capacity: Option<usize>,
}

impl GraphCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            graphs: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn get(&mut self, index: usize) -> Option<Arc<CrystalGraph>> {
        let graph = Arc::clone(&self.graphs.get(&index)?.0);
        if self.capacity.is_some() {
            self.touch(index);
        }
        Some(graph)
    }

    pub fn insert(&mut self, index: usize, graph: Arc<CrystalGraph>) {
        let Some(capacity) = self.capacity else {
            self.graphs.insert(index, (graph, 0));
            return;
        };

        if !self.graphs.contains_key(&index) && self.graphs.len() >= capacity {
            if let Some((_, lru)) = self.order.pop_first() {
                self.graphs.remove(&lru);
            }
        }
        let stamp = self.next_stamp();
        if let Some((_, old)) = self.graphs.insert(index, (graph, stamp)) {
            self.order.remove(&old);
        }
        self.order.insert(stamp, index);
    }

    fn touch(&mut self, index: usize) {
        let stamp = self.next_stamp();
        if let Some((_, last_used)) = self.graphs.get_mut(&index) {
            self.order.remove(last_used);
            *last_used = stamp;
            self.order.insert(stamp, index);
        }
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.graphs.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(id: &str) -> Arc<CrystalGraph> {
        Arc::new(CrystalGraph {
            id: id.to_string(),
            target: 0.0,
            num_atoms: 0,
            max_num_nbr: 1,
            atom_fea_len: 1,
            nbr_fea_len: 1,
            atom_features: vec![],
            neighbor_features: vec![],
            neighbor_index: vec![],
        })
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = GraphCache::new(Some(2));
        cache.insert(1, graph("a"));
        cache.insert(2, graph("b"));
        assert_eq!(cache.len(), 2);

        // Touch 1 so that 2 becomes least recently used
        assert!(cache.get(1).is_some());
        cache.insert(3, graph("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(2).is_none());
        assert_eq!(cache.get(1).unwrap().id, "a");
        assert_eq!(cache.get(3).unwrap().id, "c");
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let mut cache = GraphCache::unbounded();
        for i in 0..100 {
            cache.insert(i, graph("x"));
        }
        assert_eq!(cache.len(), 100);
        assert!(cache.get(0).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_recency_after_many_hits() {
        let capacity = 1000;
        let mut cache = GraphCache::new(Some(capacity));
        for i in 0..capacity {
            cache.insert(i, graph("x"));
        }
        // Hit everything but index 0, oldest first, several times over
        for _ in 0..20 {
            for i in 1..capacity {
                assert!(cache.get(i).is_some());
            }
        }
        assert_eq!(cache.order.len(), capacity);

        cache.insert(capacity, graph("y"));
        assert!(cache.get(0).is_none());
        assert_eq!(cache.len(), capacity);
        assert_eq!(cache.order.len(), capacity);

        // Index 1 is now the oldest
        cache.insert(capacity + 1, graph("z"));
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let mut cache = GraphCache::new(Some(2));
        cache.insert(1, graph("a"));
        cache.insert(2, graph("b"));
        cache.insert(2, graph("b2"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(2).unwrap().id, "b2");
        assert!(cache.get(1).is_some());
    }
}
