//! Command payloads accepted by the ledger services.
//!
//! Every command carries its business time (`occurred_at`); services never
//! read the wall clock for state they persist.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{Deadline, OrderId, ProductId, WarehouseId};

use crate::movement::DocumentRef;
use crate::stock::StockKey;

/// Command: ReceiveStock. Also used for customer returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: i64,
    pub document: Option<DocumentRef>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipStock {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub document: Option<DocumentRef>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransferStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: i64,
    pub notes: Option<String>,
    /// Local to the calling process; never serialized.
    #[serde(skip)]
    pub deadline: Option<Deadline>,
    pub occurred_at: DateTime<Utc>,
}

impl TransferStock {
    pub fn source_key(&self) -> StockKey {
        StockKey::new(self.from_warehouse_id, self.product_id)
    }

    pub fn destination_key(&self) -> StockKey {
        StockKey::new(self.to_warehouse_id, self.product_id)
    }
}

/// Command: AdjustStock (absolute set from a physical count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sku: String,
    pub new_quantity: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WriteOffStock (damage, loss, expiry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOffStock {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: String,
    pub document: Option<DocumentRef>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub expires_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

impl ReserveStock {
    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.product_id)
    }
}

/// Command: ReceiveBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBatch {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sku: String,
    pub batch_number: String,
    pub lot_number: Option<String>,
    pub quantity: i64,
    pub expiry_date: Option<DateTime<Utc>>,
    pub cost_price: Decimal,
    pub location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsumeFefo (pick `quantity` units across batches in FEFO order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeFefo {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub document: Option<DocumentRef>,
    pub occurred_at: DateTime<Utc>,
}
