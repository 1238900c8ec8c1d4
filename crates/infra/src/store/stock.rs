use std::sync::Arc;

use stockflow_core::{ExpectedVersion, ProductId, WarehouseId};
use stockflow_inventory::{Stock, StockKey};

use super::StoreError;
use super::table::VersionedTable;

/// Coarse stock rows keyed by (warehouse, product).
///
/// `save` is a compare-and-swap on the row version: it fails with
/// `StoreError::Concurrency` unless the stored version matches `expected`
/// (version 0 = no row). The returned snapshot carries the new version.
pub trait StockStore: Send + Sync {
    fn get(&self, key: StockKey) -> Result<Option<Stock>, StoreError>;

    fn list_by_product(&self, product_id: ProductId) -> Result<Vec<Stock>, StoreError>;

    fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>, StoreError>;

    fn save(&self, stock: Stock, expected: ExpectedVersion) -> Result<Stock, StoreError>;

    /// Delete a row (used to undo the creation of a row whose movement never landed).
    fn remove(&self, key: StockKey, expected: ExpectedVersion) -> Result<(), StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn get(&self, key: StockKey) -> Result<Option<Stock>, StoreError> {
        (**self).get(key)
    }

    fn list_by_product(&self, product_id: ProductId) -> Result<Vec<Stock>, StoreError> {
        (**self).list_by_product(product_id)
    }

    fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>, StoreError> {
        (**self).list_by_warehouse(warehouse_id)
    }

    fn save(&self, stock: Stock, expected: ExpectedVersion) -> Result<Stock, StoreError> {
        (**self).save(stock, expected)
    }

    fn remove(&self, key: StockKey, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).remove(key, expected)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    rows: VersionedTable<Stock>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StockStore for InMemoryStockStore {
    fn get(&self, key: StockKey) -> Result<Option<Stock>, StoreError> {
        self.rows.get(&key)
    }

    fn list_by_product(&self, product_id: ProductId) -> Result<Vec<Stock>, StoreError> {
        let mut rows = self.rows.find(|s| s.product_id == product_id)?;
        rows.sort_by_key(|s| s.warehouse_id);
        Ok(rows)
    }

    fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>, StoreError> {
        let mut rows = self.rows.find(|s| s.warehouse_id == warehouse_id)?;
        rows.sort_by(|a, b| a.sku.cmp(&b.sku).then(a.product_id.cmp(&b.product_id)));
        Ok(rows)
    }

    fn save(&self, stock: Stock, expected: ExpectedVersion) -> Result<Stock, StoreError> {
        self.rows.save(stock, expected)
    }

    fn remove(&self, key: StockKey, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.rows.remove(&key, expected)
    }
}
