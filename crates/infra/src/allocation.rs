//! Which warehouse should ship an order line, plus the warehouse registry it reads.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use stockflow_core::{ProductId, WarehouseId};
use stockflow_inventory::{
    AllocationResult, InventoryError, InventoryResult, Warehouse, choose_warehouse,
    ensure_positive, total_available,
};

use crate::store::{StockStore, StoreError, WarehouseDirectory};

/// What `delete_warehouse` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseRemoval {
    Deleted,
    /// The warehouse still holds stock, so it was only deactivated.
    Deactivated(Warehouse),
}

pub struct AllocationPlanner<S, W> {
    stocks: S,
    warehouses: W,
}

impl<S, W> AllocationPlanner<S, W>
where
    S: StockStore,
    W: WarehouseDirectory,
{
    pub fn new(stocks: S, warehouses: W) -> Self {
        Self { stocks, warehouses }
    }

    /// Pick one warehouse able to ship `quantity` units on its own.
    ///
    /// Read-only: nothing is held. Callers reserve against the returned
    /// warehouse and must handle `InsufficientStock` if they lose a race.
    pub fn allocate_stock(&self, product_id: ProductId, quantity: i64) -> InventoryResult<AllocationResult> {
        ensure_positive(quantity)?;
        let stocks = self.stocks.list_by_product(product_id)?;
        let warehouses = self.warehouses.list()?;

        let result = choose_warehouse(product_id, quantity, &stocks, &warehouses);
        match result.warehouse_id {
            Some(warehouse_id) => debug!(
                product_id = %product_id,
                quantity,
                warehouse_id = %warehouse_id,
                "allocation found"
            ),
            None => info!(product_id = %product_id, quantity, "no single warehouse can fulfill"),
        }
        Ok(result)
    }

    /// Free units across every warehouse, whatever its order flags.
    pub fn get_total_available(&self, product_id: ProductId) -> InventoryResult<i64> {
        Ok(total_available(&self.stocks.list_by_product(product_id)?))
    }

    pub fn register_warehouse(&self, warehouse: Warehouse) -> InventoryResult<Warehouse> {
        if warehouse.is_default {
            self.demote_defaults(warehouse.created_at)?;
        }
        self.warehouses.insert(warehouse.clone())?;
        info!(
            warehouse_id = %warehouse.id,
            code = %warehouse.code,
            priority = warehouse.priority,
            "warehouse registered"
        );
        Ok(warehouse)
    }

    pub fn update_warehouse(&self, warehouse: Warehouse) -> InventoryResult<Warehouse> {
        if self.warehouses.get(warehouse.id)?.is_none() {
            return Err(InventoryError::WarehouseNotFound(warehouse.id));
        }
        if warehouse.is_default {
            self.demote_defaults(warehouse.updated_at)?;
        }
        self.warehouses.update(warehouse.clone()).map_err(|err| match err {
            StoreError::NotFound(_) => InventoryError::WarehouseNotFound(warehouse.id),
            other => other.into(),
        })?;
        Ok(warehouse)
    }

    /// Remove a warehouse. One that still holds units is deactivated instead,
    /// which also takes it out of order allocation.
    pub fn delete_warehouse(&self, id: WarehouseId, at: DateTime<Utc>) -> InventoryResult<WarehouseRemoval> {
        let mut warehouse = self.get_warehouse(id)?;
        let holds_stock = self
            .stocks
            .list_by_warehouse(id)?
            .iter()
            .any(|s| s.quantity > 0);

        if !holds_stock {
            if !self.warehouses.remove(id)? {
                return Err(InventoryError::WarehouseNotFound(id));
            }
            info!(warehouse_id = %id, code = %warehouse.code, "warehouse deleted");
            return Ok(WarehouseRemoval::Deleted);
        }

        warehouse.is_active = false;
        warehouse.is_default = false;
        warehouse.updated_at = at;
        self.update_warehouse(warehouse.clone())?;
        warn!(warehouse_id = %id, code = %warehouse.code, "warehouse still holds stock; deactivated");
        Ok(WarehouseRemoval::Deactivated(warehouse))
    }

    pub fn get_warehouse(&self, id: WarehouseId) -> InventoryResult<Warehouse> {
        self.warehouses
            .get(id)?
            .ok_or(InventoryError::WarehouseNotFound(id))
    }

    pub fn list_warehouses(&self, active_only: bool) -> InventoryResult<Vec<Warehouse>> {
        let all = self.warehouses.list()?;
        Ok(all.into_iter().filter(|w| !active_only || w.is_active).collect())
    }

    pub fn default_warehouse(&self) -> InventoryResult<Option<Warehouse>> {
        Ok(self.warehouses.list()?.into_iter().find(|w| w.is_default))
    }

    fn demote_defaults(&self, at: DateTime<Utc>) -> InventoryResult<()> {
        for mut previous in self.warehouses.list()?.into_iter().filter(|w| w.is_default) {
            previous.is_default = false;
            previous.updated_at = at;
            self.warehouses.update(previous)?;
        }
        Ok(())
    }
}
