//! Coarse per-(warehouse, product) stock aggregate.
//!
//! Every transition is a pure function from one snapshot to the next; nothing
//! here mutates shared state. Infra persists the returned snapshot with a
//! version-checked write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{ProductId, StockId, Versioned, WarehouseId};

use crate::error::{InventoryError, InventoryResult, checked_increase, ensure_positive};

/// Storage key of a stock row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
}

impl StockKey {
    pub fn new(warehouse_id: WarehouseId, product_id: ProductId) -> Self {
        Self {
            warehouse_id,
            product_id,
        }
    }
}

/// Stock of one product in one warehouse.
///
/// Invariant: `available == quantity - reserved`, all three non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub reorder_point: Option<i64>,
    /// Shelf/bin location.
    pub location: Option<String>,
    pub cost_price: Decimal,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version (0 = never persisted).
    pub version: u64,
}

impl Stock {
    /// Empty row for a product that has never been stocked in this warehouse.
    pub fn new(key: StockKey, sku: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: StockId::new(),
            warehouse_id: key.warehouse_id,
            product_id: key.product_id,
            sku: sku.into(),
            quantity: 0,
            reserved: 0,
            available: 0,
            min_stock: 0,
            max_stock: None,
            reorder_point: None,
            location: None,
            cost_price: Decimal::ZERO,
            updated_at: at,
            version: 0,
        }
    }

    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.product_id)
    }

    pub fn is_consistent(&self) -> bool {
        self.quantity >= 0
            && self.reserved >= 0
            && self.available >= 0
            && self.available == self.quantity - self.reserved
    }

    pub fn is_low_stock(&self) -> bool {
        self.min_stock > 0 && self.available <= self.min_stock
    }

    pub fn needs_reorder(&self) -> bool {
        self.reorder_point.is_some_and(|rp| self.available <= rp)
    }

    /// Add physically received units.
    pub fn receive(&self, quantity: i64, at: DateTime<Utc>) -> InventoryResult<Stock> {
        ensure_positive(quantity)?;
        let mut next = self.clone();
        next.quantity = checked_increase(next.quantity, quantity)?;
        Ok(next.finish(at))
    }

    /// Remove free units (shipment, transfer-out, write-off).
    pub fn ship(&self, quantity: i64, at: DateTime<Utc>) -> InventoryResult<Stock> {
        ensure_positive(quantity)?;
        self.ensure_available(quantity)?;
        let mut next = self.clone();
        next.quantity -= quantity;
        Ok(next.finish(at))
    }

    /// Place a hold on free units.
    pub fn reserve(&self, quantity: i64, at: DateTime<Utc>) -> InventoryResult<Stock> {
        ensure_positive(quantity)?;
        self.ensure_available(quantity)?;
        let mut next = self.clone();
        next.reserved = checked_increase(next.reserved, quantity)?;
        Ok(next.finish(at))
    }

    /// Drop a hold. Floored at zero so a double release cannot drive `reserved` negative.
    pub fn release(&self, quantity: i64, at: DateTime<Utc>) -> InventoryResult<Stock> {
        ensure_positive(quantity)?;
        let mut next = self.clone();
        next.reserved = (next.reserved - quantity).max(0);
        Ok(next.finish(at))
    }

    /// Ship previously held units: both `reserved` and `quantity` go down.
    pub fn fulfill(&self, quantity: i64, at: DateTime<Utc>) -> InventoryResult<Stock> {
        ensure_positive(quantity)?;
        let reserved = (self.reserved - quantity).max(0);
        let remaining = self.quantity - quantity;
        if remaining < reserved {
            return Err(InventoryError::InsufficientStock {
                warehouse_id: self.warehouse_id,
                product_id: self.product_id,
                requested: quantity,
                available: self.quantity - reserved,
            });
        }
        let mut next = self.clone();
        next.reserved = reserved;
        next.quantity = remaining;
        Ok(next.finish(at))
    }

    /// Set an absolute quantity (cycle count). Returns the new snapshot and the signed delta.
    pub fn adjust_to(&self, new_quantity: i64, at: DateTime<Utc>) -> InventoryResult<(Stock, i64)> {
        if new_quantity < 0 {
            return Err(InventoryError::InvalidQuantity {
                quantity: new_quantity,
            });
        }
        if new_quantity < self.reserved {
            return Err(InventoryError::StockReserved {
                warehouse_id: self.warehouse_id,
                product_id: self.product_id,
                new_quantity,
                reserved: self.reserved,
            });
        }
        let delta = new_quantity - self.quantity;
        let mut next = self.clone();
        next.quantity = new_quantity;
        Ok((next.finish(at), delta))
    }

    /// Take back an earlier change of `quantity` and `reserved` by the given
    /// deltas, whatever else has happened to the row since.
    pub fn revert(&self, quantity_delta: i64, reserved_delta: i64, at: DateTime<Utc>) -> InventoryResult<Stock> {
        let quantity = self.quantity.checked_sub(quantity_delta);
        let reserved = self.reserved.checked_sub(reserved_delta);
        let (Some(quantity), Some(reserved)) = (quantity, reserved) else {
            return Err(InventoryError::InvalidQuantity {
                quantity: quantity_delta,
            });
        };
        if reserved < 0 || quantity < reserved {
            return Err(InventoryError::InsufficientStock {
                warehouse_id: self.warehouse_id,
                product_id: self.product_id,
                requested: quantity_delta,
                available: self.available,
            });
        }
        let mut next = self.clone();
        next.quantity = quantity;
        next.reserved = reserved;
        Ok(next.finish(at))
    }

    fn ensure_available(&self, quantity: i64) -> InventoryResult<()> {
        if self.available < quantity {
            return Err(InventoryError::InsufficientStock {
                warehouse_id: self.warehouse_id,
                product_id: self.product_id,
                requested: quantity,
                available: self.available,
            });
        }
        Ok(())
    }

    /// Recompute `available` as the last step before the snapshot is persisted.
    fn finish(mut self, at: DateTime<Utc>) -> Stock {
        self.available = self.quantity - self.reserved;
        self.updated_at = at;
        debug_assert!(self.is_consistent(), "stock invariant broken: {self:?}");
        self
    }
}

impl Versioned for Stock {
    type Key = StockKey;

    fn key(&self) -> StockKey {
        self.stock_key()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
