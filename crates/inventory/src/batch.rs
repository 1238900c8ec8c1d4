//! Per-batch (lot) stock with expiry metadata.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{BatchId, ProductId, Versioned, WarehouseId};

use crate::command::ReceiveBatch;
use crate::error::{InventoryError, InventoryResult, checked_increase, ensure_positive};
use crate::stock::StockKey;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchKey {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub batch_number: String,
}

/// `Active ⇄ Depleted` follows the remaining quantity. `Recalled` and
/// `Expired` are set by quality workflows outside the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Depleted,
    Recalled,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStock {
    pub id: BatchId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sku: String,
    pub batch_number: String,
    pub lot_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
    pub location: Option<String>,
    pub cost_price: Decimal,
    pub status: BatchStatus,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl BatchStock {
    /// Validate a receipt and build the new batch row from it.
    pub fn from_receipt(cmd: &ReceiveBatch) -> InventoryResult<BatchStock> {
        ensure_positive(cmd.quantity)?;
        if let Some(expiry_date) = cmd.expiry_date {
            if expiry_date < cmd.occurred_at {
                return Err(InventoryError::ExpiryDateInPast { expiry_date });
            }
        }
        Ok(BatchStock {
            id: BatchId::new(),
            warehouse_id: cmd.warehouse_id,
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            batch_number: cmd.batch_number.clone(),
            lot_number: cmd.lot_number.clone(),
            expiry_date: cmd.expiry_date,
            quantity: cmd.quantity,
            reserved: 0,
            available: cmd.quantity,
            location: cmd.location.clone(),
            cost_price: cmd.cost_price,
            status: BatchStatus::Active,
            received_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
            version: 0,
        })
    }

    pub fn batch_key(&self) -> BatchKey {
        BatchKey {
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            batch_number: self.batch_number.clone(),
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

    /// Expiry date reached or passed. Batches without an expiry never expire.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|e| e <= now)
    }

    /// Add units from a second receipt of the same batch number.
    pub fn top_up(&self, cmd: &ReceiveBatch) -> InventoryResult<BatchStock> {
        ensure_positive(cmd.quantity)?;
        if cmd.expiry_date.is_some() && cmd.expiry_date != self.expiry_date {
            return Err(InventoryError::BatchExpiryMismatch {
                batch_number: self.batch_number.clone(),
            });
        }
        let mut next = self.clone();
        next.quantity = checked_increase(next.quantity, cmd.quantity)?;
        Ok(next.finish(cmd.occurred_at))
    }

    /// Pick units out of the batch.
    pub fn consume(&self, quantity: i64, at: DateTime<Utc>) -> InventoryResult<BatchStock> {
        ensure_positive(quantity)?;
        if self.available < quantity {
            return Err(InventoryError::InsufficientStock {
                warehouse_id: self.warehouse_id,
                product_id: self.product_id,
                requested: quantity,
                available: self.available,
            });
        }
        let mut next = self.clone();
        next.quantity -= quantity;
        Ok(next.finish(at))
    }

    /// Put units back (compensation of a partially applied consumption).
    pub fn restore(&self, quantity: i64, at: DateTime<Utc>) -> InventoryResult<BatchStock> {
        ensure_positive(quantity)?;
        let mut next = self.clone();
        next.quantity = checked_increase(next.quantity, quantity)?;
        Ok(next.finish(at))
    }

    /// Drop every free unit, keeping only what is reserved. Returns the new
    /// snapshot and the number of units written off.
    pub fn write_off_available(&self, at: DateTime<Utc>) -> (BatchStock, i64) {
        let written_off = self.available;
        let mut next = self.clone();
        next.quantity = next.reserved;
        (next.finish(at), written_off)
    }

    fn finish(mut self, at: DateTime<Utc>) -> BatchStock {
        self.available = self.quantity - self.reserved;
        self.updated_at = at;
        self.status = match self.status {
            BatchStatus::Active | BatchStatus::Depleted if self.quantity == 0 => BatchStatus::Depleted,
            BatchStatus::Active | BatchStatus::Depleted => BatchStatus::Active,
            other => other,
        };
        debug_assert!(self.is_consistent(), "batch invariant broken: {self:?}");
        self
    }
}

impl Versioned for BatchStock {
    type Key = BatchKey;

    fn key(&self) -> BatchKey {
        self.batch_key()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
