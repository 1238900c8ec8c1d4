//! Ledger services and their storage boundary.
//!
//! Services are synchronous and generic over the store traits in [`store`];
//! [`services::InMemoryServices`] wires them over the in-memory stores.

pub mod alerts;
pub mod allocation;
pub mod batch;
pub mod config;
pub mod ledger;
pub mod reservation;
pub mod saga;
pub mod services;
pub mod store;
pub mod sweeper;

pub use alerts::{AlertQuery, ExpiryAlertEngine};
pub use allocation::{AllocationPlanner, WarehouseRemoval};
pub use batch::{BatchExpiryTracker, StockReconciler};
pub use config::LedgerConfig;
pub use ledger::StockLedger;
pub use reservation::ReservationManager;
pub use saga::{TransferOutcome, TransferSaga, TransferSagaState};
pub use services::InMemoryServices;
pub use sweeper::{ReservationSweeper, SweeperConfig, SweeperHandle, SweeperStats};

#[cfg(test)]
mod integration_tests;
