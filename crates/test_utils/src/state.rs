// Path: crates/test_utils/src/state.rs
//! An in-memory `StateAccess` implementation for tests.

use meridian_api::state::{StateAccess, StateScanIter};
use meridian_types::error::StateError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A BTreeMap-backed store. Prefix scans yield keys in ascending order, which
/// the engine's height-indexed queues depend on; do not swap this for a hash
/// map.
#[derive(Debug, Clone, Default)]
pub struct MemState {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemState {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, for assertions on cleanup behavior.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Counts keys under a prefix, for assertions on queue/index cleanup.
    pub fn count_prefix(&self, prefix: &[u8]) -> usize {
        self.data.keys().filter(|k| k.starts_with(prefix)).count()
    }
}

impl StateAccess for MemState {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.data.get(key).cloned())
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.data.remove(key);
        Ok(())
    }

    fn batch_set(&mut self, updates: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StateError> {
        for (key, value) in updates {
            self.insert(key, value)?;
        }
        Ok(())
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, StateError> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    fn batch_apply(
        &mut self,
        inserts: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), StateError> {
        for key in deletes {
            self.delete(key)?;
        }
        for (key, value) in inserts {
            self.insert(key, value)?;
        }
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
        let results: Vec<_> = self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Ok((Arc::from(k.as_slice()), Arc::from(v.as_slice()))))
            .collect();
        Ok(Box::new(results.into_iter()))
    }
}
