use dashmap::DashMap;
use fnv::FnvBuildHasher;

use crate::KeyValue;

/// Per-request results of one processing run.
///
/// Writers for distinct request ids never contend on a lock. A repeated id
/// replaces the earlier entry. Whole-store reads are not isolated from
/// concurrent writers, so they belong after every request has drained.
#[derive(Debug, Default)]
pub struct BatchStore {
    results: DashMap<u64, Vec<KeyValue>, FnvBuildHasher>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self {
            results: DashMap::with_hasher(FnvBuildHasher::default()),
        }
    }

    /// Stores the reduced pairs of request `id`, returning what it replaced.
    pub fn store(&self, id: u64, results: Vec<KeyValue>) -> Option<Vec<KeyValue>> {
        self.results.insert(id, results)
    }

    pub fn get(&self, id: u64) -> Option<Vec<KeyValue>> {
        self.results.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Removes and returns every stored pair, flattened.
    pub fn drain(&self) -> Vec<KeyValue> {
        let ids: Vec<u64> = self.results.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.results.remove(&id))
            .flat_map(|(_, results)| results)
            .collect()
    }
}
