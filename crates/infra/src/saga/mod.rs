//! Multi-step ledger operations with compensation.

pub mod transfer;

pub use transfer::{TransferOutcome, TransferSaga, TransferSagaState};
