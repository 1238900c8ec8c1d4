use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockflow_core::WarehouseId;
use stockflow_inventory::Warehouse;

use super::StoreError;

/// Warehouse metadata lookup.
pub trait WarehouseDirectory: Send + Sync {
    fn get(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError>;

    /// Ordered by priority, then id.
    fn list(&self) -> Result<Vec<Warehouse>, StoreError>;

    fn insert(&self, warehouse: Warehouse) -> Result<(), StoreError>;

    fn update(&self, warehouse: Warehouse) -> Result<(), StoreError>;

    /// Drop the entry. Returns whether it existed.
    fn remove(&self, id: WarehouseId) -> Result<bool, StoreError>;
}

impl<W> WarehouseDirectory for Arc<W>
where
    W: WarehouseDirectory + ?Sized,
{
    fn get(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Warehouse>, StoreError> {
        (**self).list()
    }

    fn insert(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        (**self).insert(warehouse)
    }

    fn update(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        (**self).update(warehouse)
    }

    fn remove(&self, id: WarehouseId) -> Result<bool, StoreError> {
        (**self).remove(id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWarehouseDirectory {
    inner: RwLock<HashMap<WarehouseId, Warehouse>>,
}

impl InMemoryWarehouseDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WarehouseDirectory for InMemoryWarehouseDirectory {
    fn get(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<Warehouse>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        let mut all: Vec<_> = map.values().cloned().collect();
        all.sort_by_key(|w| (w.priority, w.id));
        Ok(all)
    }

    fn insert(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if map.contains_key(&warehouse.id) {
            return Err(StoreError::Duplicate(format!("warehouse {}", warehouse.id)));
        }
        map.insert(warehouse.id, warehouse);
        Ok(())
    }

    fn update(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        match map.get_mut(&warehouse.id) {
            Some(current) => {
                *current = warehouse;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("warehouse {}", warehouse.id))),
        }
    }

    fn remove(&self, id: WarehouseId) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        Ok(map.remove(&id).is_some())
    }
}
