//! Immutable audit records of stock-affecting events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{MovementId, ProductId, WarehouseId};
use stockflow_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Receipt,
    Shipment,
    Transfer,
    Adjustment,
    Return,
    WriteOff,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Receipt => "receipt",
            MovementType::Shipment => "shipment",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::WriteOff => "write_off",
        }
    }
}

/// Reference to the business document that caused a movement (purchase order,
/// sales order, count sheet, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// One journal record. `quantity` is always a positive magnitude; direction is
/// carried by which of `warehouse_from_id` / `warehouse_to_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub movement_type: MovementType,
    pub warehouse_from_id: Option<WarehouseId>,
    pub warehouse_to_id: Option<WarehouseId>,
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: i64,
    pub document: Option<DocumentRef>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    fn base(
        movement_type: MovementType,
        product_id: ProductId,
        sku: &str,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            movement_type,
            warehouse_from_id: None,
            warehouse_to_id: None,
            product_id,
            sku: sku.to_string(),
            quantity,
            document: None,
            reason: None,
            notes: None,
            created_at: at,
        }
    }

    /// Units arriving into `warehouse_id` (receipt, return).
    pub fn inbound(
        movement_type: MovementType,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        sku: &str,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Self {
        let mut m = Self::base(movement_type, product_id, sku, quantity, at);
        m.warehouse_to_id = Some(warehouse_id);
        m
    }

    /// Units leaving `warehouse_id` (shipment, write-off).
    pub fn outbound(
        movement_type: MovementType,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        sku: &str,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Self {
        let mut m = Self::base(movement_type, product_id, sku, quantity, at);
        m.warehouse_from_id = Some(warehouse_id);
        m
    }

    pub fn transfer(
        from: WarehouseId,
        to: WarehouseId,
        product_id: ProductId,
        sku: &str,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Self {
        let mut m = Self::base(MovementType::Transfer, product_id, sku, quantity, at);
        m.warehouse_from_id = Some(from);
        m.warehouse_to_id = Some(to);
        m
    }

    /// Cycle-count correction; the sign of `delta` picks the direction.
    pub fn adjustment(
        warehouse_id: WarehouseId,
        product_id: ProductId,
        sku: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Self {
        if delta < 0 {
            Self::outbound(MovementType::Adjustment, warehouse_id, product_id, sku, -delta, at)
        } else {
            Self::inbound(MovementType::Adjustment, warehouse_id, product_id, sku, delta, at)
        }
    }

    pub fn with_document(mut self, document: Option<DocumentRef>) -> Self {
        self.document = document;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Net effect of this movement on `warehouse_id`'s quantity.
    pub fn signed_effect(&self, warehouse_id: WarehouseId) -> i64 {
        let mut effect = 0;
        if self.warehouse_to_id == Some(warehouse_id) {
            effect += self.quantity;
        }
        if self.warehouse_from_id == Some(warehouse_id) {
            effect -= self.quantity;
        }
        effect
    }

    pub fn touches(&self, warehouse_id: WarehouseId) -> bool {
        self.warehouse_from_id == Some(warehouse_id) || self.warehouse_to_id == Some(warehouse_id)
    }
}

/// Filter for journal reads. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub product_id: Option<ProductId>,
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Maximum rows returned, newest first. `None` or 0 means unbounded.
    pub limit: Option<usize>,
}

impl MovementQuery {
    pub fn for_warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            ..Self::default()
        }
    }

    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, m: &StockMovement) -> bool {
        self.warehouse_id.is_none_or(|wh| m.touches(wh))
            && self.product_id.is_none_or(|p| m.product_id == p)
            && self.movement_type.is_none_or(|t| m.movement_type == t)
            && self.from.is_none_or(|from| m.created_at >= from)
            && self.to.is_none_or(|to| m.created_at <= to)
    }
}

impl Event for StockMovement {
    fn event_type(&self) -> &'static str {
        match self.movement_type {
            MovementType::Receipt => "inventory.stock.receipt",
            MovementType::Shipment => "inventory.stock.shipment",
            MovementType::Transfer => "inventory.stock.transfer",
            MovementType::Adjustment => "inventory.stock.adjustment",
            MovementType::Return => "inventory.stock.return",
            MovementType::WriteOff => "inventory.stock.write_off",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
