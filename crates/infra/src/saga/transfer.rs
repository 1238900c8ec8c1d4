//! Warehouse → warehouse transfer saga.
//!
//! Orchestrates the flow:
//! 1. Validate and check the caller's deadline (no writes yet)
//! 2. Debit the source row
//! 3. Check the deadline again
//! 4. Credit (or create) the destination row and journal one `transfer` movement
//!
//! Compensating action: credit the source back if step 3 or 4 fails.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use stockflow_inventory::{
    InventoryError, InventoryResult, Stock, StockMovement, TransferStock, ensure_positive,
};

use crate::ledger::{StockLedger, Transition};
use crate::store::{JournalEntry, MovementJournal, StockStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferSagaState {
    #[default]
    Pending,
    SourceDebited,
    Completed,
    /// Source credited back after a later step failed.
    Compensated { reason: String },
    /// Failed before any write, or compensation itself failed.
    Failed { reason: String },
}

/// Both rows after a completed transfer plus the journaled movement.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub source: Stock,
    pub destination: Stock,
    pub movement: JournalEntry,
}

pub struct TransferSaga<'a, S, J> {
    ledger: &'a StockLedger<S, J>,
    cmd: &'a TransferStock,
    state: TransferSagaState,
}

impl<'a, S, J> TransferSaga<'a, S, J>
where
    S: StockStore,
    J: MovementJournal,
{
    pub fn new(ledger: &'a StockLedger<S, J>, cmd: &'a TransferStock) -> Self {
        Self {
            ledger,
            cmd,
            state: TransferSagaState::Pending,
        }
    }

    pub fn state(&self) -> &TransferSagaState {
        &self.state
    }

    pub fn run(mut self) -> InventoryResult<TransferOutcome> {
        self.execute()
    }

    /// Like `run`, but leaves the saga around so its final state can be inspected.
    pub fn execute(&mut self) -> InventoryResult<TransferOutcome> {
        let cmd = self.cmd;
        if let Err(err) = self.validate() {
            self.state = TransferSagaState::Failed {
                reason: err.to_string(),
            };
            return Err(err);
        }

        let source = match self.ledger.apply(cmd.source_key(), None, cmd.occurred_at, "transfer_out", |s| {
            Ok(Some(Transition::silent(s.ship(cmd.quantity, cmd.occurred_at)?)))
        }) {
            Ok(applied) => applied.stock,
            Err(err) => {
                self.state = TransferSagaState::Failed {
                    reason: err.to_string(),
                };
                return Err(err);
            }
        };
        self.state = TransferSagaState::SourceDebited;

        if let Some(deadline) = cmd.deadline {
            if let Err(err) = deadline.check() {
                let err = InventoryError::from(err);
                self.compensate(&err);
                return Err(err);
            }
        }

        let credited = self.ledger.apply(
            cmd.destination_key(),
            Some(&cmd.sku),
            cmd.occurred_at,
            "transfer_in",
            |d| {
                let next = d.receive(cmd.quantity, cmd.occurred_at)?;
                let movement = StockMovement::transfer(
                    cmd.from_warehouse_id,
                    cmd.to_warehouse_id,
                    cmd.product_id,
                    &source.sku,
                    cmd.quantity,
                    cmd.occurred_at,
                )
                .with_notes(cmd.notes.clone());
                Ok(Some(Transition::recorded(next, movement)))
            },
        );

        match credited {
            Ok(applied) => {
                let Some(movement) = applied.entry else {
                    let err = InventoryError::storage("transfer credit produced no journal entry");
                    self.compensate(&err);
                    return Err(err);
                };
                self.state = TransferSagaState::Completed;
                info!(
                    from_warehouse_id = %cmd.from_warehouse_id,
                    to_warehouse_id = %cmd.to_warehouse_id,
                    product_id = %cmd.product_id,
                    quantity = cmd.quantity,
                    sequence_number = movement.sequence_number,
                    "stock transferred"
                );
                Ok(TransferOutcome {
                    source,
                    destination: applied.stock,
                    movement,
                })
            }
            Err(err) => {
                self.compensate(&err);
                Err(err)
            }
        }
    }

    fn validate(&self) -> InventoryResult<()> {
        let cmd = self.cmd;
        if cmd.from_warehouse_id == cmd.to_warehouse_id {
            return Err(InventoryError::InvalidTransfer {
                warehouse_id: cmd.from_warehouse_id,
            });
        }
        ensure_positive(cmd.quantity)?;
        if let Some(deadline) = cmd.deadline {
            deadline.check()?;
        }
        Ok(())
    }

    fn compensate(&mut self, cause: &InventoryError) {
        let cmd = self.cmd;
        warn!(
            from_warehouse_id = %cmd.from_warehouse_id,
            to_warehouse_id = %cmd.to_warehouse_id,
            product_id = %cmd.product_id,
            quantity = cmd.quantity,
            cause = %cause,
            "transfer failed after debit; crediting source back"
        );

        let restored = self.ledger.apply(
            cmd.source_key(),
            None,
            cmd.occurred_at,
            "transfer_compensation",
            |s| Ok(Some(Transition::silent(s.receive(cmd.quantity, cmd.occurred_at)?))),
        );

        self.state = match restored {
            Ok(_) => TransferSagaState::Compensated {
                reason: cause.to_string(),
            },
            Err(err) => {
                error!(
                    from_warehouse_id = %cmd.from_warehouse_id,
                    product_id = %cmd.product_id,
                    quantity = cmd.quantity,
                    error = %err,
                    "transfer compensation failed; source is short"
                );
                TransferSagaState::Failed {
                    reason: format!("{cause}; compensation failed: {err}"),
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::store::{InMemoryMovementJournal, InMemoryStockStore};
    use stockflow_core::{Deadline, DomainError, ProductId, WarehouseId};
    use stockflow_inventory::{MovementQuery, MovementType, ReceiveStock, StockKey};

    type TestLedger = StockLedger<Arc<InMemoryStockStore>, Arc<InMemoryMovementJournal>>;

    fn seeded(quantity: i64) -> (TestLedger, WarehouseId, ProductId) {
        let ledger = StockLedger::new(
            Arc::new(InMemoryStockStore::new()),
            Arc::new(InMemoryMovementJournal::new()),
        );
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        ledger
            .receive_stock(&ReceiveStock {
                warehouse_id: wh,
                product_id: product,
                sku: "SKU-T".to_string(),
                quantity,
                document: None,
                notes: None,
                occurred_at: Utc::now(),
            })
            .unwrap();
        (ledger, wh, product)
    }

    fn transfer(from: WarehouseId, to: WarehouseId, product: ProductId, quantity: i64) -> TransferStock {
        TransferStock {
            from_warehouse_id: from,
            to_warehouse_id: to,
            product_id: product,
            sku: "SKU-T".to_string(),
            quantity,
            notes: Some("rebalance".to_string()),
            deadline: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn completed_transfer_moves_units_and_journals_once() {
        let (ledger, from, product) = seeded(100);
        let to = WarehouseId::new();

        let mut saga_cmd = transfer(from, to, product, 30);
        saga_cmd.deadline = Some(Deadline::after(Duration::from_secs(30)));
        let mut saga = TransferSaga::new(&ledger, &saga_cmd);
        let outcome = saga.execute().unwrap();

        assert_eq!(saga.state(), &TransferSagaState::Completed);
        assert_eq!(outcome.source.quantity, 70);
        assert_eq!(outcome.destination.quantity, 30);
        assert_eq!(outcome.movement.movement.movement_type, MovementType::Transfer);
        assert_eq!(outcome.movement.movement.warehouse_from_id, Some(from));
        assert_eq!(outcome.movement.movement.warehouse_to_id, Some(to));

        let transfers = ledger
            .movement_history(&MovementQuery {
                movement_type: Some(MovementType::Transfer),
                ..MovementQuery::default()
            })
            .unwrap();
        assert_eq!(transfers.len(), 1);
    }

    #[test]
    fn same_warehouse_is_rejected_before_any_write() {
        let (ledger, wh, product) = seeded(10);
        let cmd = transfer(wh, wh, product, 1);
        let mut saga = TransferSaga::new(&ledger, &cmd);

        let err = saga.execute().unwrap_err();
        assert_eq!(err, InventoryError::InvalidTransfer { warehouse_id: wh });
        assert!(matches!(saga.state(), TransferSagaState::Failed { .. }));
        assert_eq!(ledger.get_stock(wh, product).unwrap().version, 1);
    }

    #[test]
    fn insufficient_source_leaves_destination_absent() {
        let (ledger, from, product) = seeded(5);
        let to = WarehouseId::new();

        let err = ledger.transfer_stock(&transfer(from, to, product, 6)).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        assert!(ledger.stocks().get(StockKey::new(to, product)).unwrap().is_none());
        assert_eq!(ledger.get_stock(from, product).unwrap().quantity, 5);
    }

    #[test]
    fn elapsed_deadline_fails_before_the_first_write() {
        let (ledger, from, product) = seeded(5);
        let mut cmd = transfer(from, WarehouseId::new(), product, 1);
        cmd.deadline = Some(Deadline::after(Duration::ZERO));

        let err = ledger.transfer_stock(&cmd).unwrap_err();
        assert_eq!(err, InventoryError::Domain(DomainError::DeadlineExceeded));
        assert_eq!(ledger.get_stock(from, product).unwrap().version, 1);
    }

    #[test]
    fn saga_state_uses_snake_case_tags() {
        let state = TransferSagaState::Compensated {
            reason: "deadline exceeded".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({ "compensated": { "reason": "deadline exceeded" } }));
        assert_eq!(serde_json::to_value(TransferSagaState::SourceDebited).unwrap(), "source_debited");
    }
}
