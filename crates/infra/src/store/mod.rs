//! Persistence boundary for the ledger.
//!
//! Each record kind has a small storage trait plus an in-memory reference
//! implementation (`RwLock<HashMap>`), intended for tests/dev. Traits carry
//! an `Arc<T>` blanket impl so one store can be shared by several services.
//! A SQL backend would implement the same traits; none ships here.

pub mod alert;
pub mod batch;
pub mod journal;
pub mod reservation;
pub mod stock;
pub mod warehouse;

mod table;

use thiserror::Error;

use stockflow_inventory::InventoryError;

pub use alert::{AlertStore, InMemoryAlertStore};
pub use batch::{BatchStore, InMemoryBatchStore};
pub use journal::{InMemoryMovementJournal, JournalEntry, MovementJournal, PublishingJournal};
pub use reservation::{InMemoryReservationStore, ReservationStore};
pub use stock::{InMemoryStockStore, StockStore};
pub use warehouse::{InMemoryWarehouseDirectory, WarehouseDirectory};

/// Storage operation error.
///
/// These are **infrastructure errors** (contention, availability) as opposed
/// to domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Version check failed; the caller should re-read and retry.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("record already exists: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    /// Backend unreachable or internally broken (poisoned lock, IO).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Unavailable("lock poisoned".to_string())
    }

    pub fn is_concurrency(&self) -> bool {
        matches!(self, StoreError::Concurrency(_))
    }
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => InventoryError::Conflict(msg),
            other => InventoryError::Storage(other.to_string()),
        }
    }
}
