//! Foundation building blocks shared by the ledger crates.
//!
//! This crate contains **pure** primitives (no infrastructure concerns):
//! identifiers, the base error model, optimistic-concurrency versioning and
//! caller-supplied deadlines.

pub mod deadline;
pub mod error;
pub mod id;
pub mod version;

pub use deadline::Deadline;
pub use error::{DomainError, DomainResult};
pub use id::{
    AlertId, BatchId, MovementId, OrderId, ProductId, ReservationId, StockId, UserId, WarehouseId,
};
pub use version::{ExpectedVersion, Versioned};
