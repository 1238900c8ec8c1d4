use std::sync::Arc;

use stockflow_core::{BatchId, ExpectedVersion, ProductId, WarehouseId};
use stockflow_inventory::{BatchKey, BatchStock};

use super::StoreError;
use super::table::VersionedTable;

/// Batch rows keyed by (warehouse, product, batch number), version-checked
/// like `StockStore`.
pub trait BatchStore: Send + Sync {
    fn get(&self, key: &BatchKey) -> Result<Option<BatchStock>, StoreError>;

    fn get_by_id(&self, id: BatchId) -> Result<Option<BatchStock>, StoreError>;

    fn list(&self, warehouse_id: WarehouseId, product_id: ProductId) -> Result<Vec<BatchStock>, StoreError>;

    fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<BatchStock>, StoreError>;

    fn save(&self, batch: BatchStock, expected: ExpectedVersion) -> Result<BatchStock, StoreError>;

    fn remove(&self, key: &BatchKey, expected: ExpectedVersion) -> Result<(), StoreError>;
}

impl<B> BatchStore for Arc<B>
where
    B: BatchStore + ?Sized,
{
    fn get(&self, key: &BatchKey) -> Result<Option<BatchStock>, StoreError> {
        (**self).get(key)
    }

    fn get_by_id(&self, id: BatchId) -> Result<Option<BatchStock>, StoreError> {
        (**self).get_by_id(id)
    }

    fn list(&self, warehouse_id: WarehouseId, product_id: ProductId) -> Result<Vec<BatchStock>, StoreError> {
        (**self).list(warehouse_id, product_id)
    }

    fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<BatchStock>, StoreError> {
        (**self).list_by_warehouse(warehouse_id)
    }

    fn save(&self, batch: BatchStock, expected: ExpectedVersion) -> Result<BatchStock, StoreError> {
        (**self).save(batch, expected)
    }

    fn remove(&self, key: &BatchKey, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).remove(key, expected)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBatchStore {
    rows: VersionedTable<BatchStock>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchStore for InMemoryBatchStore {
    fn get(&self, key: &BatchKey) -> Result<Option<BatchStock>, StoreError> {
        self.rows.get(key)
    }

    fn get_by_id(&self, id: BatchId) -> Result<Option<BatchStock>, StoreError> {
        Ok(self.rows.find(|b| b.id == id)?.into_iter().next())
    }

    fn list(&self, warehouse_id: WarehouseId, product_id: ProductId) -> Result<Vec<BatchStock>, StoreError> {
        self.rows
            .find(|b| b.warehouse_id == warehouse_id && b.product_id == product_id)
    }

    fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<BatchStock>, StoreError> {
        self.rows.find(|b| b.warehouse_id == warehouse_id)
    }

    fn save(&self, batch: BatchStock, expected: ExpectedVersion) -> Result<BatchStock, StoreError> {
        self.rows.save(batch, expected)
    }

    fn remove(&self, key: &BatchKey, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.rows.remove(key, expected)
    }
}
