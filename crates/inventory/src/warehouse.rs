//! Warehouse metadata consulted by allocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::WarehouseId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseKind {
    Main,
    Store,
    Dropship,
    Supplier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
    pub kind: WarehouseKind,
    /// Allocation priority; lower is preferred.
    pub priority: i32,
    pub is_active: bool,
    pub is_default: bool,
    /// Whether this location may fulfill customer orders.
    pub accepts_orders: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        kind: WarehouseKind,
        priority: i32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WarehouseId::new(),
            code: code.into(),
            name: name.into(),
            kind,
            priority,
            is_active: true,
            is_default: false,
            accepts_orders: true,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn with_accepts_orders(mut self, accepts_orders: bool) -> Self {
        self.accepts_orders = accepts_orders;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Active and flagged to accept orders.
    pub fn can_fulfill_orders(&self) -> bool {
        self.is_active && self.accepts_orders
    }
}
