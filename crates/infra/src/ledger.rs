//! Stock ledger: the only writer of coarse stock rows.
//!
//! ## Write protocol
//!
//! Every operation runs the same loop:
//!
//! ```text
//! load row (or start an empty one) → pure transition → version-checked save → journal append
//! ```
//!
//! A `Concurrency` error from the save means another writer got there first:
//! the loop re-reads and re-decides, up to `max_write_retries` extra times.
//! If the journal append fails after the row was written, the change is
//! reversed through the same retrying loop, so no quantity change survives
//! without its movement even when another writer touched the row meanwhile.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use stockflow_core::{OrderId, ProductId, Versioned, WarehouseId};
use stockflow_inventory::{
    AdjustStock, DocumentRef, InventoryError, InventoryResult, MovementQuery, MovementType,
    ReceiveStock, ShipStock, Stock, StockKey, StockMovement, TransferStock, WriteOffStock,
    ensure_positive,
};

use crate::config::DEFAULT_MAX_WRITE_RETRIES;
use crate::saga::transfer::{TransferOutcome, TransferSaga};
use crate::store::{JournalEntry, MovementJournal, StockStore};

/// Result of a pure decision over the current row.
pub(crate) struct Transition {
    pub next: Stock,
    pub movement: Option<StockMovement>,
}

impl Transition {
    pub fn silent(next: Stock) -> Self {
        Self {
            next,
            movement: None,
        }
    }

    pub fn recorded(next: Stock, movement: StockMovement) -> Self {
        Self {
            next,
            movement: Some(movement),
        }
    }
}

/// A persisted row together with the journal entry written for it, if any.
#[derive(Debug, Clone)]
pub(crate) struct Applied {
    pub stock: Stock,
    pub entry: Option<JournalEntry>,
}

pub struct StockLedger<S, J> {
    stocks: S,
    journal: J,
    max_write_retries: u32,
}

impl<S, J> StockLedger<S, J>
where
    S: StockStore,
    J: MovementJournal,
{
    pub fn new(stocks: S, journal: J) -> Self {
        Self {
            stocks,
            journal,
            max_write_retries: DEFAULT_MAX_WRITE_RETRIES,
        }
    }

    pub fn with_max_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }

    pub fn stocks(&self) -> &S {
        &self.stocks
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn get_stock(&self, warehouse_id: WarehouseId, product_id: ProductId) -> InventoryResult<Stock> {
        self.stocks
            .get(StockKey::new(warehouse_id, product_id))?
            .ok_or(InventoryError::StockNotFound {
                warehouse_id,
                product_id,
            })
    }

    /// Every warehouse row for one product.
    pub fn get_product_stock(&self, product_id: ProductId) -> InventoryResult<Vec<Stock>> {
        Ok(self.stocks.list_by_product(product_id)?)
    }

    /// Book inbound units; the row is created on first receipt.
    pub fn receive_stock(&self, cmd: &ReceiveStock) -> InventoryResult<Stock> {
        self.inbound(MovementType::Receipt, cmd, "receive")
    }

    /// Book units coming back from a customer.
    pub fn return_stock(&self, cmd: &ReceiveStock) -> InventoryResult<Stock> {
        self.inbound(MovementType::Return, cmd, "return")
    }

    pub fn ship_stock(&self, cmd: &ShipStock) -> InventoryResult<Stock> {
        ensure_positive(cmd.quantity)?;
        let key = StockKey::new(cmd.warehouse_id, cmd.product_id);
        let applied = self.apply(key, None, cmd.occurred_at, "ship", |s| {
            let next = s.ship(cmd.quantity, cmd.occurred_at)?;
            let movement = StockMovement::outbound(
                MovementType::Shipment,
                s.warehouse_id,
                s.product_id,
                &s.sku,
                cmd.quantity,
                cmd.occurred_at,
            )
            .with_document(cmd.document.clone())
            .with_notes(cmd.notes.clone());
            Ok(Some(Transition::recorded(next, movement)))
        })?;

        info!(
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id,
            quantity = cmd.quantity,
            available = applied.stock.available,
            "stock shipped"
        );
        Ok(applied.stock)
    }

    /// Move units between warehouses as a compensating two-step saga.
    pub fn transfer_stock(&self, cmd: &TransferStock) -> InventoryResult<TransferOutcome> {
        TransferSaga::new(self, cmd).run()
    }

    /// Set the absolute quantity found by a physical count.
    pub fn adjust_stock(&self, cmd: &AdjustStock) -> InventoryResult<Stock> {
        if cmd.new_quantity < 0 {
            return Err(InventoryError::InvalidQuantity {
                quantity: cmd.new_quantity,
            });
        }
        let key = StockKey::new(cmd.warehouse_id, cmd.product_id);
        let applied = self.apply(key, Some(&cmd.sku), cmd.occurred_at, "adjust", |s| {
            let (next, delta) = s.adjust_to(cmd.new_quantity, cmd.occurred_at)?;
            if delta == 0 {
                return Ok(None);
            }
            let movement =
                StockMovement::adjustment(s.warehouse_id, s.product_id, &s.sku, delta, cmd.occurred_at)
                    .with_reason(cmd.reason.clone())
                    .with_notes(cmd.notes.clone());
            Ok(Some(Transition::recorded(next, movement)))
        })?;

        match &applied.entry {
            Some(entry) => info!(
                warehouse_id = %cmd.warehouse_id,
                product_id = %cmd.product_id,
                new_quantity = cmd.new_quantity,
                delta = entry.movement.signed_effect(cmd.warehouse_id),
                reason = %cmd.reason,
                "stock adjusted"
            ),
            None => debug!(
                warehouse_id = %cmd.warehouse_id,
                product_id = %cmd.product_id,
                "adjustment matches current quantity; nothing recorded"
            ),
        }
        Ok(applied.stock)
    }

    /// Remove free units that can no longer be sold (damage, loss, expiry).
    pub fn write_off(&self, cmd: &WriteOffStock) -> InventoryResult<Stock> {
        ensure_positive(cmd.quantity)?;
        let key = StockKey::new(cmd.warehouse_id, cmd.product_id);
        let applied = self.apply(key, None, cmd.occurred_at, "write_off", |s| {
            let next = s.ship(cmd.quantity, cmd.occurred_at)?;
            let movement = StockMovement::outbound(
                MovementType::WriteOff,
                s.warehouse_id,
                s.product_id,
                &s.sku,
                cmd.quantity,
                cmd.occurred_at,
            )
            .with_reason(cmd.reason.clone())
            .with_document(cmd.document.clone());
            Ok(Some(Transition::recorded(next, movement)))
        })?;

        warn!(
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id,
            quantity = cmd.quantity,
            reason = %cmd.reason,
            "stock written off"
        );
        Ok(applied.stock)
    }

    /// Rows at or under their configured minimum.
    pub fn low_stock(&self, warehouse_id: WarehouseId) -> InventoryResult<Vec<Stock>> {
        let rows = self.stocks.list_by_warehouse(warehouse_id)?;
        Ok(rows.into_iter().filter(Stock::is_low_stock).collect())
    }

    pub fn movement_history(&self, query: &MovementQuery) -> InventoryResult<Vec<JournalEntry>> {
        Ok(self.journal.query(query)?)
    }

    pub(crate) fn hold(&self, key: StockKey, quantity: i64, at: DateTime<Utc>) -> InventoryResult<Stock> {
        let applied = self.apply(key, None, at, "reserve", |s| {
            Ok(Some(Transition::silent(s.reserve(quantity, at)?)))
        })?;
        Ok(applied.stock)
    }

    pub(crate) fn release_hold(
        &self,
        key: StockKey,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> InventoryResult<Stock> {
        let applied = self.apply(key, None, at, "release", |s| {
            Ok(Some(Transition::silent(s.release(quantity, at)?)))
        })?;
        Ok(applied.stock)
    }

    /// Ship held units for `order_id`, recording a shipment against the order.
    pub(crate) fn fulfill_hold(
        &self,
        key: StockKey,
        quantity: i64,
        order_id: OrderId,
        at: DateTime<Utc>,
    ) -> InventoryResult<Stock> {
        let applied = self.apply(key, None, at, "fulfill", |s| {
            let next = s.fulfill(quantity, at)?;
            let movement = StockMovement::outbound(
                MovementType::Shipment,
                s.warehouse_id,
                s.product_id,
                &s.sku,
                quantity,
                at,
            )
            .with_document(Some(DocumentRef::new("order", order_id.to_string())));
            Ok(Some(Transition::recorded(next, movement)))
        })?;
        Ok(applied.stock)
    }

    fn inbound(
        &self,
        movement_type: MovementType,
        cmd: &ReceiveStock,
        op: &'static str,
    ) -> InventoryResult<Stock> {
        ensure_positive(cmd.quantity)?;
        let key = StockKey::new(cmd.warehouse_id, cmd.product_id);
        let applied = self.apply(key, Some(&cmd.sku), cmd.occurred_at, op, |s| {
            let next = s.receive(cmd.quantity, cmd.occurred_at)?;
            let movement = StockMovement::inbound(
                movement_type,
                s.warehouse_id,
                s.product_id,
                &s.sku,
                cmd.quantity,
                cmd.occurred_at,
            )
            .with_document(cmd.document.clone())
            .with_notes(cmd.notes.clone());
            Ok(Some(Transition::recorded(next, movement)))
        })?;

        info!(
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id,
            quantity = cmd.quantity,
            movement_type = movement_type.as_str(),
            on_hand = applied.stock.quantity,
            "stock received"
        );
        Ok(applied.stock)
    }

    /// Run one read-decide-write cycle with optimistic retries.
    ///
    /// `create_sku` allows the row to be created when missing; otherwise a
    /// missing row is `StockNotFound`. `decide` returning `None` means "no
    /// change" and nothing is written.
    pub(crate) fn apply<F>(
        &self,
        key: StockKey,
        create_sku: Option<&str>,
        at: DateTime<Utc>,
        op: &'static str,
        decide: F,
    ) -> InventoryResult<Applied>
    where
        F: Fn(&Stock) -> InventoryResult<Option<Transition>>,
    {
        for attempt in 0..=self.max_write_retries {
            let current = match (self.stocks.get(key)?, create_sku) {
                (Some(row), _) => row,
                (None, Some(sku)) => Stock::new(key, sku, at),
                (None, None) => {
                    return Err(InventoryError::StockNotFound {
                        warehouse_id: key.warehouse_id,
                        product_id: key.product_id,
                    });
                }
            };

            let Some(Transition { next, movement }) = decide(&current)? else {
                return Ok(Applied {
                    stock: current,
                    entry: None,
                });
            };

            let saved = match self.stocks.save(next, current.expected_version()) {
                Ok(saved) => saved,
                Err(err) if err.is_concurrency() => {
                    debug!(
                        op,
                        attempt,
                        warehouse_id = %key.warehouse_id,
                        product_id = %key.product_id,
                        "stock write conflict; retrying"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let entry = match movement {
                Some(movement) => match self.journal.append(movement) {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        error!(
                            op,
                            warehouse_id = %key.warehouse_id,
                            product_id = %key.product_id,
                            error = %err,
                            "journal append failed; undoing stock write"
                        );
                        self.undo_write(&current, &saved, at);
                        return Err(err.into());
                    }
                },
                None => None,
            };

            return Ok(Applied { stock: saved, entry });
        }

        warn!(
            op,
            warehouse_id = %key.warehouse_id,
            product_id = %key.product_id,
            attempts = self.max_write_retries + 1,
            "giving up on contended stock row"
        );
        Err(InventoryError::conflict(format!(
            "{op} on product {} in warehouse {}: row still contended after {} attempts",
            key.product_id,
            key.warehouse_id,
            self.max_write_retries + 1
        )))
    }

    fn undo_write(&self, previous: &Stock, written: &Stock, at: DateTime<Utc>) {
        let key = written.stock_key();
        let result = if previous.version == 0 {
            match self.stocks.remove(key, written.expected_version()) {
                Err(err) if err.is_concurrency() => self.revert(previous, written, at),
                other => other.map_err(InventoryError::from),
            }
        } else {
            self.revert(previous, written, at)
        };
        if let Err(err) = result {
            error!(
                warehouse_id = %key.warehouse_id,
                product_id = %key.product_id,
                error = %err,
                "failed to undo stock write; row and journal disagree"
            );
        }
    }

    /// Apply the inverse of `previous → written` to whatever the row holds now.
    fn revert(&self, previous: &Stock, written: &Stock, at: DateTime<Utc>) -> InventoryResult<()> {
        let quantity_delta = written.quantity - previous.quantity;
        let reserved_delta = written.reserved - previous.reserved;
        self.apply(written.stock_key(), None, at, "undo", |s| {
            Ok(Some(Transition::silent(s.revert(quantity_delta, reserved_delta, at)?)))
        })
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{InMemoryMovementJournal, InMemoryStockStore, StoreError};
    use stockflow_core::ExpectedVersion;

    type TestLedger = StockLedger<Arc<InMemoryStockStore>, Arc<InMemoryMovementJournal>>;

    fn test_ledger() -> (TestLedger, Arc<InMemoryMovementJournal>) {
        let journal = Arc::new(InMemoryMovementJournal::new());
        let ledger = StockLedger::new(Arc::new(InMemoryStockStore::new()), journal.clone());
        (ledger, journal)
    }

    fn receive(wh: WarehouseId, product: ProductId, quantity: i64) -> ReceiveStock {
        ReceiveStock {
            warehouse_id: wh,
            product_id: product,
            sku: "SKU-001".to_string(),
            quantity,
            document: Some(DocumentRef::new("purchase_order", "PO-1")),
            notes: None,
            occurred_at: Utc::now(),
        }
    }

    fn ship(wh: WarehouseId, product: ProductId, quantity: i64) -> ShipStock {
        ShipStock {
            warehouse_id: wh,
            product_id: product,
            quantity,
            document: None,
            notes: None,
            occurred_at: Utc::now(),
        }
    }

    fn adjust(wh: WarehouseId, product: ProductId, new_quantity: i64) -> AdjustStock {
        AdjustStock {
            warehouse_id: wh,
            product_id: product,
            sku: "SKU-001".to_string(),
            new_quantity,
            reason: "cycle count".to_string(),
            notes: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn first_receipt_creates_the_row_and_one_movement() {
        let (ledger, journal) = test_ledger();
        let (wh, product) = (WarehouseId::new(), ProductId::new());

        let stock = ledger.receive_stock(&receive(wh, product, 100)).unwrap();
        assert_eq!((stock.quantity, stock.available, stock.version), (100, 100, 1));

        let entries = journal.query(&MovementQuery::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].movement.movement_type, MovementType::Receipt);
        assert_eq!(entries[0].movement.warehouse_to_id, Some(wh));
        assert_eq!(
            entries[0].movement.document,
            Some(DocumentRef::new("purchase_order", "PO-1"))
        );
    }

    #[test]
    fn invalid_quantity_writes_nothing() {
        let (ledger, journal) = test_ledger();
        let (wh, product) = (WarehouseId::new(), ProductId::new());

        let err = ledger.receive_stock(&receive(wh, product, 0)).unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { quantity: 0 });
        assert!(journal.is_empty());
        assert!(matches!(
            ledger.get_stock(wh, product),
            Err(InventoryError::StockNotFound { .. })
        ));
    }

    #[test]
    fn ship_requires_an_existing_row_and_free_units() {
        let (ledger, _) = test_ledger();
        let (wh, product) = (WarehouseId::new(), ProductId::new());

        assert!(matches!(
            ledger.ship_stock(&ship(wh, product, 1)),
            Err(InventoryError::StockNotFound { .. })
        ));

        ledger.receive_stock(&receive(wh, product, 10)).unwrap();
        let err = ledger.ship_stock(&ship(wh, product, 11)).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientStock {
                requested: 11,
                available: 10,
                ..
            }
        ));
        assert_eq!(ledger.get_stock(wh, product).unwrap().quantity, 10);
    }

    #[test]
    fn adjustment_records_signed_delta_and_skips_no_ops() {
        let (ledger, journal) = test_ledger();
        let (wh, product) = (WarehouseId::new(), ProductId::new());

        let created = ledger.adjust_stock(&adjust(wh, product, 40)).unwrap();
        assert_eq!(created.quantity, 40);

        ledger.adjust_stock(&adjust(wh, product, 40)).unwrap();
        assert_eq!(journal.len(), 1);

        let lowered = ledger.adjust_stock(&adjust(wh, product, 25)).unwrap();
        assert_eq!(lowered.available, 25);

        let entries = journal.query(&MovementQuery::for_warehouse(wh)).unwrap();
        assert_eq!(entries.len(), 2);
        let latest = &entries[0].movement;
        assert_eq!(latest.movement_type, MovementType::Adjustment);
        assert_eq!(latest.quantity, 15);
        assert_eq!(latest.warehouse_from_id, Some(wh));
        assert_eq!(latest.reason.as_deref(), Some("cycle count"));
    }

    #[test]
    fn adjustment_below_reserved_is_rejected() {
        let (ledger, _) = test_ledger();
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        ledger.receive_stock(&receive(wh, product, 50)).unwrap();
        ledger
            .hold(StockKey::new(wh, product), 20, Utc::now())
            .unwrap();

        let err = ledger.adjust_stock(&adjust(wh, product, 10)).unwrap_err();
        assert!(matches!(err, InventoryError::StockReserved { reserved: 20, .. }));
        assert!(matches!(
            ledger.adjust_stock(&adjust(wh, product, -1)),
            Err(InventoryError::InvalidQuantity { quantity: -1 })
        ));
    }

    #[test]
    fn returns_and_write_offs_use_their_own_movement_types() {
        let (ledger, journal) = test_ledger();
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        ledger.receive_stock(&receive(wh, product, 10)).unwrap();
        ledger.return_stock(&receive(wh, product, 2)).unwrap();
        let after = ledger
            .write_off(&WriteOffStock {
                warehouse_id: wh,
                product_id: product,
                quantity: 5,
                reason: "damaged".to_string(),
                document: None,
                occurred_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(after.quantity, 7);

        let types: Vec<_> = journal
            .query(&MovementQuery::default())
            .unwrap()
            .into_iter()
            .map(|e| e.movement.movement_type)
            .collect();
        assert_eq!(
            types,
            vec![MovementType::WriteOff, MovementType::Return, MovementType::Receipt]
        );
    }

    #[test]
    fn low_stock_lists_rows_at_or_under_minimum() {
        let (ledger, _) = test_ledger();
        let wh = WarehouseId::new();
        let (low, fine) = (ProductId::new(), ProductId::new());
        for product in [low, fine] {
            ledger.receive_stock(&receive(wh, product, 5)).unwrap();
        }
        let mut row = ledger.get_stock(wh, low).unwrap();
        row.min_stock = 5;
        ledger
            .stocks()
            .save(row.clone(), row.expected_version())
            .unwrap();

        let low_rows = ledger.low_stock(wh).unwrap();
        assert_eq!(low_rows.len(), 1);
        assert_eq!(low_rows[0].product_id, low);
    }

    struct FailingJournal;

    impl MovementJournal for FailingJournal {
        fn append(&self, _movement: StockMovement) -> Result<JournalEntry, StoreError> {
            Err(StoreError::Unavailable("journal offline".to_string()))
        }

        fn query(&self, _query: &MovementQuery) -> Result<Vec<JournalEntry>, StoreError> {
            Ok(vec![])
        }
    }

    #[test]
    fn failed_journal_append_undoes_the_row_write() {
        let stocks = Arc::new(InMemoryStockStore::new());
        let ledger = StockLedger::new(stocks.clone(), FailingJournal);
        let (wh, product) = (WarehouseId::new(), ProductId::new());

        let err = ledger.receive_stock(&receive(wh, product, 10)).unwrap_err();
        assert!(matches!(err, InventoryError::Storage(_)));
        assert!(stocks.get(StockKey::new(wh, product)).unwrap().is_none());

        let key = StockKey::new(wh, product);
        let seeded = stocks
            .save(
                Stock::new(key, "SKU", Utc::now()).receive(10, Utc::now()).unwrap(),
                ExpectedVersion::Absent,
            )
            .unwrap();
        assert!(ledger.ship_stock(&ship(wh, product, 4)).is_err());
        let restored = stocks.get(key).unwrap().unwrap();
        assert_eq!(restored.quantity, seeded.quantity);
        assert!(restored.version > seeded.version);
    }

    /// Journal that lets another writer hold a unit on the row before failing.
    struct InterleavedJournal {
        stocks: Arc<InMemoryStockStore>,
        key: StockKey,
    }

    impl MovementJournal for InterleavedJournal {
        fn append(&self, _movement: StockMovement) -> Result<JournalEntry, StoreError> {
            let row = self.stocks.get(self.key)?.expect("row written before append");
            let held = row.reserve(1, Utc::now()).expect("free unit to hold");
            self.stocks.save(held, row.expected_version())?;
            Err(StoreError::Unavailable("journal offline".to_string()))
        }

        fn query(&self, _query: &MovementQuery) -> Result<Vec<JournalEntry>, StoreError> {
            Ok(vec![])
        }
    }

    #[test]
    fn undo_survives_a_write_between_save_and_append() {
        let stocks = Arc::new(InMemoryStockStore::new());
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        let key = StockKey::new(wh, product);
        stocks
            .save(
                Stock::new(key, "SKU", Utc::now()).receive(10, Utc::now()).unwrap(),
                ExpectedVersion::Absent,
            )
            .unwrap();
        let ledger = StockLedger::new(
            stocks.clone(),
            InterleavedJournal {
                stocks: stocks.clone(),
                key,
            },
        );

        assert!(ledger.receive_stock(&receive(wh, product, 5)).is_err());
        let row = stocks.get(key).unwrap().unwrap();
        assert_eq!((row.quantity, row.reserved, row.available), (10, 1, 9));
    }

    #[test]
    fn receipt_overflowing_the_row_leaves_it_untouched() {
        let (ledger, journal) = test_ledger();
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        ledger.receive_stock(&receive(wh, product, 1)).unwrap();

        let err = ledger.receive_stock(&receive(wh, product, i64::MAX)).unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { quantity: i64::MAX });
        assert_eq!(ledger.get_stock(wh, product).unwrap().quantity, 1);
        assert_eq!(journal.len(), 1);
    }

    /// Store that bumps the stored row behind the ledger's back on every save,
    /// so every compare-and-swap loses.
    struct AlwaysContended(InMemoryStockStore);

    impl StockStore for AlwaysContended {
        fn get(&self, key: StockKey) -> Result<Option<Stock>, StoreError> {
            self.0.get(key)
        }

        fn list_by_product(&self, product_id: ProductId) -> Result<Vec<Stock>, StoreError> {
            self.0.list_by_product(product_id)
        }

        fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>, StoreError> {
            self.0.list_by_warehouse(warehouse_id)
        }

        fn save(&self, stock: Stock, _expected: ExpectedVersion) -> Result<Stock, StoreError> {
            self.0.save(stock, ExpectedVersion::Any)?;
            Err(StoreError::Concurrency("lost the race".to_string()))
        }

        fn remove(&self, key: StockKey, expected: ExpectedVersion) -> Result<(), StoreError> {
            self.0.remove(key, expected)
        }
    }

    #[test]
    fn exhausted_retries_surface_as_conflict() {
        let ledger = StockLedger::new(AlwaysContended(InMemoryStockStore::new()), InMemoryMovementJournal::new())
            .with_max_write_retries(2);
        let err = ledger
            .receive_stock(&receive(WarehouseId::new(), ProductId::new(), 1))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
        assert!(ledger.journal().is_empty());
    }
}
