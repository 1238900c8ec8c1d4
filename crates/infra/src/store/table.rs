//! Version-checked in-memory table shared by the stock and batch stores.

use std::collections::HashMap;
use std::sync::RwLock;

use stockflow_core::{ExpectedVersion, Versioned};

use super::StoreError;

#[derive(Debug)]
pub(crate) struct VersionedTable<V: Versioned> {
    rows: RwLock<HashMap<V::Key, V>>,
}

impl<V: Versioned> Default for VersionedTable<V> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> VersionedTable<V>
where
    V: Versioned + Clone,
{
    pub(crate) fn get(&self, key: &V::Key) -> Result<Option<V>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows.get(key).cloned())
    }

    pub(crate) fn find(&self, pred: impl Fn(&V) -> bool) -> Result<Vec<V>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows.values().filter(|v| pred(v)).cloned().collect())
    }

    /// Compare-and-swap write. The stored copy gets `current + 1` as version.
    pub(crate) fn save(&self, mut row: V, expected: ExpectedVersion) -> Result<V, StoreError> {
        let key = row.key();
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;

        let current = rows.get(&key).map(|r| r.version()).unwrap_or(0);
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "{key:?}: expected {expected:?}, found {current}"
            )));
        }

        row.set_version(current + 1);
        rows.insert(key, row.clone());
        Ok(row)
    }

    pub(crate) fn remove(&self, key: &V::Key, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let current = rows.get(key).map(|r| r.version()).unwrap_or(0);
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "{key:?}: expected {expected:?}, found {current}"
            )));
        }
        rows.remove(key);
        Ok(())
    }
}
