//! Time-bounded holds against a stock row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{OrderId, ProductId, ReservationId, WarehouseId};

use crate::error::{InventoryError, InventoryResult};
use crate::stock::StockKey;

/// `Active` moves exactly once into one of the terminal states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservation {
    pub id: ReservationId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockReservation {
    pub fn new(
        order_id: OrderId,
        key: StockKey,
        quantity: i64,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            order_id,
            warehouse_id: key.warehouse_id,
            product_id: key.product_id,
            quantity,
            status: ReservationStatus::Active,
            expires_at,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.warehouse_id, self.product_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at <= now
    }

    /// Move into a terminal state. Terminal states are immutable.
    pub fn transition(&self, to: ReservationStatus, at: DateTime<Utc>) -> InventoryResult<Self> {
        if !self.is_active() || to == ReservationStatus::Active {
            return Err(InventoryError::ReservationNotActive {
                reservation_id: self.id,
                status: self.status,
            });
        }
        let mut next = self.clone();
        next.status = to;
        next.updated_at = at;
        Ok(next)
    }
}
