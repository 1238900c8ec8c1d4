//! Inventory ledger domain.
//!
//! Stock, reservation, batch and alert models with their transition rules,
//! FEFO selection and warehouse choice. Everything here is deterministic
//! domain logic (no IO, no locking, no storage); `stockflow-infra`
//! orchestrates it against stores.

pub mod allocation;
pub mod batch;
pub mod command;
pub mod error;
pub mod expiry;
pub mod fefo;
pub mod movement;
pub mod reservation;
pub mod stock;
pub mod warehouse;

pub use allocation::{AllocationResult, choose_warehouse, total_available};
pub use batch::{BatchKey, BatchStatus, BatchStock};
pub use command::{
    AdjustStock, ConsumeFefo, ReceiveBatch, ReceiveStock, ReserveStock, ShipStock, TransferStock,
    WriteOffStock,
};
pub use error::{InventoryError, InventoryResult, ensure_positive};
pub use expiry::{
    AlertStatus, AlertType, ExpiryAlert, ExpiryConfig, ExpiryDashboard, classify, days_left,
    horizon,
};
pub use fefo::{BatchAllocation, allocate, fefo_order, fifo_order, select_batches, select_fefo};
pub use movement::{DocumentRef, MovementQuery, MovementType, StockMovement};
pub use reservation::{ReservationStatus, StockReservation};
pub use stock::{Stock, StockKey};
pub use warehouse::{Warehouse, WarehouseKind};
