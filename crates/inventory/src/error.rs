//! Ledger error taxonomy.

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockflow_core::{AlertId, BatchId, DomainError, ProductId, ReservationId, WarehouseId};

use crate::expiry::AlertStatus;
use crate::reservation::ReservationStatus;

/// Result type used across the inventory domain and its services.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Inventory-level error.
///
/// Every variant names the offending resource so callers (workflow modules)
/// can react structurally instead of matching on messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Quantity must be strictly positive (or non-negative for absolute sets).
    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("no stock for product {product_id} in warehouse {warehouse_id}")]
    StockNotFound {
        warehouse_id: WarehouseId,
        product_id: ProductId,
    },

    #[error("batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    #[error("expiry alert not found: {0}")]
    AlertNotFound(AlertId),

    #[error("warehouse not found: {0}")]
    WarehouseNotFound(WarehouseId),

    /// Demand exceeds what is free to promise.
    #[error(
        "insufficient stock for product {product_id} in warehouse {warehouse_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        warehouse_id: WarehouseId,
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// An adjustment would drop quantity below what is already promised to orders.
    #[error(
        "cannot set quantity of product {product_id} in warehouse {warehouse_id} to {new_quantity}: {reserved} units reserved"
    )]
    StockReserved {
        warehouse_id: WarehouseId,
        product_id: ProductId,
        new_quantity: i64,
        reserved: i64,
    },

    #[error("invalid transfer: source and destination are both warehouse {warehouse_id}")]
    InvalidTransfer { warehouse_id: WarehouseId },

    #[error("expiry date {expiry_date} is in the past")]
    ExpiryDateInPast { expiry_date: DateTime<Utc> },

    #[error("batch {batch_number} already exists with a different expiry date")]
    BatchExpiryMismatch { batch_number: String },

    /// FEFO found no batch eligible for picking at all.
    #[error("no valid stock for product {product_id} in warehouse {warehouse_id}")]
    NoValidStock {
        warehouse_id: WarehouseId,
        product_id: ProductId,
    },

    #[error("reservation {reservation_id} is {status:?}, not active")]
    ReservationNotActive {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },

    #[error("expiry alert {alert_id} is {status:?}")]
    InvalidAlertState { alert_id: AlertId, status: AlertStatus },

    /// Optimistic write retries were exhausted.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Backing store failure.
    #[error("storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InventoryError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable, machine-readable kind name (for logs and metrics labels).
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::InvalidQuantity { .. } => "invalid_quantity",
            InventoryError::StockNotFound { .. } => "stock_not_found",
            InventoryError::BatchNotFound(_) => "batch_not_found",
            InventoryError::ReservationNotFound(_) => "reservation_not_found",
            InventoryError::AlertNotFound(_) => "alert_not_found",
            InventoryError::WarehouseNotFound(_) => "warehouse_not_found",
            InventoryError::InsufficientStock { .. } => "insufficient_stock",
            InventoryError::StockReserved { .. } => "stock_reserved",
            InventoryError::InvalidTransfer { .. } => "invalid_transfer",
            InventoryError::ExpiryDateInPast { .. } => "expiry_date_in_past",
            InventoryError::BatchExpiryMismatch { .. } => "batch_expiry_mismatch",
            InventoryError::NoValidStock { .. } => "no_valid_stock",
            InventoryError::ReservationNotActive { .. } => "reservation_not_active",
            InventoryError::InvalidAlertState { .. } => "invalid_alert_state",
            InventoryError::Conflict(_) => "conflict",
            InventoryError::Storage(_) => "storage",
            InventoryError::Domain(DomainError::DeadlineExceeded) => "deadline_exceeded",
            InventoryError::Domain(_) => "domain",
        }
    }
}

/// Reject non-positive quantities.
pub fn ensure_positive(quantity: i64) -> InventoryResult<()> {
    if quantity <= 0 {
        return Err(InventoryError::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Add `quantity` to a running total, rejecting it if the total would overflow.
pub fn checked_increase(total: i64, quantity: i64) -> InventoryResult<i64> {
    total
        .checked_add(quantity)
        .ok_or(InventoryError::InvalidQuantity { quantity })
}
