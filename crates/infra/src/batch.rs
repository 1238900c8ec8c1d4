//! Batch-level stock with expiry tracking and FEFO picking.
//!
//! Batches live beside the coarse per-warehouse `Stock` rows. When a
//! `StockReconciler` is wired in, every batch quantity change is mirrored on
//! the coarse ledger and undone on the batch side if the mirror fails, so
//! the batch quantities of a (warehouse, product) always sum to the coarse
//! quantity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use stockflow_core::{ExpectedVersion, ProductId, Versioned, WarehouseId};
use stockflow_inventory::{
    BatchAllocation, BatchKey, BatchStock, ConsumeFefo, DocumentRef, ExpiryConfig, InventoryError,
    InventoryResult, ReceiveBatch, ReceiveStock, ShipStock, WriteOffStock, allocate, fefo_order,
    fifo_order, horizon, select_batches,
};

use crate::alerts::ExpiryAlertEngine;
use crate::config::DEFAULT_MAX_WRITE_RETRIES;
use crate::ledger::StockLedger;
use crate::store::{AlertStore, BatchStore, MovementJournal, StockStore};

/// Mirrors batch quantity changes onto the coarse stock ledger.
pub trait StockReconciler: Send + Sync {
    fn receive_units(&self, batch: &BatchStock, quantity: i64, at: DateTime<Utc>) -> InventoryResult<()>;

    fn consume_units(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
        document: Option<DocumentRef>,
        at: DateTime<Utc>,
    ) -> InventoryResult<()>;

    fn write_off_units(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> InventoryResult<()>;
}

impl<S, J> StockReconciler for StockLedger<S, J>
where
    S: StockStore,
    J: MovementJournal,
{
    fn receive_units(&self, batch: &BatchStock, quantity: i64, at: DateTime<Utc>) -> InventoryResult<()> {
        self.receive_stock(&ReceiveStock {
            warehouse_id: batch.warehouse_id,
            product_id: batch.product_id,
            sku: batch.sku.clone(),
            quantity,
            document: Some(DocumentRef::new("batch", batch.batch_number.clone())),
            notes: None,
            occurred_at: at,
        })
        .map(|_| ())
    }

    fn consume_units(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
        document: Option<DocumentRef>,
        at: DateTime<Utc>,
    ) -> InventoryResult<()> {
        self.ship_stock(&ShipStock {
            warehouse_id,
            product_id,
            quantity,
            document,
            notes: Some("fefo pick".to_string()),
            occurred_at: at,
        })
        .map(|_| ())
    }

    fn write_off_units(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> InventoryResult<()> {
        self.write_off(&WriteOffStock {
            warehouse_id,
            product_id,
            quantity,
            reason: reason.to_string(),
            document: None,
            occurred_at: at,
        })
        .map(|_| ())
    }
}

pub struct BatchExpiryTracker<B, A> {
    batches: B,
    alerts: Arc<ExpiryAlertEngine<B, A>>,
    config: ExpiryConfig,
    reconciler: Option<Arc<dyn StockReconciler>>,
    max_write_retries: u32,
}

impl<B, A> BatchExpiryTracker<B, A>
where
    B: BatchStore,
    A: AlertStore,
{
    /// `batches` must be the same store the alert engine reads.
    pub fn new(batches: B, alerts: Arc<ExpiryAlertEngine<B, A>>) -> Self {
        let config = alerts.config().clone();
        Self {
            batches,
            alerts,
            config,
            reconciler: None,
            max_write_retries: DEFAULT_MAX_WRITE_RETRIES,
        }
    }

    pub fn with_reconciler(mut self, reconciler: Arc<dyn StockReconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn with_max_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }

    pub fn config(&self) -> &ExpiryConfig {
        &self.config
    }

    pub fn batches(&self) -> &B {
        &self.batches
    }

    pub fn get_batch(&self, key: &BatchKey) -> InventoryResult<Option<BatchStock>> {
        Ok(self.batches.get(key)?)
    }

    /// Create a batch, or top up an existing one with the same number.
    pub fn receive_batch(&self, cmd: &ReceiveBatch) -> InventoryResult<BatchStock> {
        let fresh = BatchStock::from_receipt(cmd)?;
        let key = fresh.batch_key();
        let (previous, saved) = self.update_batch(&key, "receive_batch", |current| match current {
            Some(existing) => existing.top_up(cmd),
            None => Ok(fresh.clone()),
        })?;

        if let Some(reconciler) = &self.reconciler {
            if let Err(err) = reconciler.receive_units(&saved, cmd.quantity, cmd.occurred_at) {
                error!(
                    warehouse_id = %cmd.warehouse_id,
                    batch_number = %cmd.batch_number,
                    error = %err,
                    "coarse receipt failed; undoing batch receipt"
                );
                self.undo_receipt(&saved, previous.is_none(), cmd.quantity, cmd.occurred_at);
                return Err(err);
            }
        }

        info!(
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id,
            batch_number = %cmd.batch_number,
            quantity = cmd.quantity,
            on_hand = saved.quantity,
            topped_up = previous.is_some(),
            "batch received"
        );

        if let Err(err) = self.alerts.evaluate_batch(&saved, cmd.occurred_at) {
            warn!(batch_id = %saved.id, error = %err, "expiry evaluation on receipt failed");
        }
        Ok(saved)
    }

    /// Candidate batches for `required` units, uncapped.
    pub fn get_fefo_stock(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        required: i64,
        now: DateTime<Utc>,
    ) -> InventoryResult<Vec<BatchStock>> {
        let batches = self.batches.list(warehouse_id, product_id)?;
        let order = if self.config.fefo_enabled { fefo_order } else { fifo_order };
        select_batches(
            warehouse_id,
            product_id,
            &batches,
            required,
            now,
            self.config.block_expired,
            order,
        )
    }

    pub fn allocate_fefo(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        required: i64,
        now: DateTime<Utc>,
    ) -> InventoryResult<Vec<BatchAllocation>> {
        let candidates = self.get_fefo_stock(warehouse_id, product_id, required, now)?;
        Ok(allocate(&candidates, required))
    }

    /// Pick units across batches. Either every pick lands or none does.
    pub fn consume_fefo(&self, cmd: &ConsumeFefo) -> InventoryResult<Vec<BatchAllocation>> {
        let at = cmd.occurred_at;
        let picks = self.allocate_fefo(cmd.warehouse_id, cmd.product_id, cmd.quantity, at)?;

        let mut done: Vec<(BatchKey, i64)> = Vec::with_capacity(picks.len());
        for pick in &picks {
            let key = BatchKey {
                warehouse_id: cmd.warehouse_id,
                product_id: cmd.product_id,
                batch_number: pick.batch_number.clone(),
            };
            let result = self.update_batch(&key, "consume_fefo", |current| match current {
                Some(batch) => batch.consume(pick.quantity, at),
                None => Err(InventoryError::BatchNotFound(pick.batch_id)),
            });
            if let Err(err) = result {
                warn!(
                    warehouse_id = %cmd.warehouse_id,
                    batch_number = %pick.batch_number,
                    error = %err,
                    "batch pick failed; restoring earlier picks"
                );
                self.restore_picks(&done, at);
                return Err(err);
            }
            done.push((key, pick.quantity));
        }

        if let Some(reconciler) = &self.reconciler {
            let shipped = reconciler.consume_units(
                cmd.warehouse_id,
                cmd.product_id,
                cmd.quantity,
                cmd.document.clone(),
                at,
            );
            if let Err(err) = shipped {
                error!(
                    warehouse_id = %cmd.warehouse_id,
                    product_id = %cmd.product_id,
                    error = %err,
                    "coarse shipment failed; restoring batch picks"
                );
                self.restore_picks(&done, at);
                return Err(err);
            }
        }

        info!(
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id,
            quantity = cmd.quantity,
            batches = picks.len(),
            "fefo pick applied"
        );
        Ok(picks)
    }

    /// Write off the free units of every expired batch in the warehouse.
    ///
    /// Does nothing unless `auto_write_off` is enabled. Returns the batches
    /// as they stand after the write-off.
    pub fn auto_write_off_expired(&self, warehouse_id: WarehouseId, now: DateTime<Utc>) -> InventoryResult<Vec<BatchStock>> {
        if !self.config.auto_write_off {
            debug!(warehouse_id = %warehouse_id, "auto write-off disabled");
            return Ok(Vec::new());
        }

        let mut expired: Vec<BatchStock> = self
            .batches
            .list_by_warehouse(warehouse_id)?
            .into_iter()
            .filter(|b| b.available > 0 && b.has_expired(now))
            .collect();
        expired.sort_by(fefo_order);

        let mut written = Vec::with_capacity(expired.len());
        for batch in expired {
            let key = batch.batch_key();
            let (previous, saved) = self.update_batch(&key, "auto_write_off", |current| match current {
                Some(b) => Ok(b.write_off_available(now).0),
                None => Err(InventoryError::BatchNotFound(batch.id)),
            })?;
            let amount = previous.map_or(0, |p| p.available);
            if amount == 0 {
                continue;
            }

            if let Some(reconciler) = &self.reconciler {
                let reconciled = reconciler.write_off_units(
                    saved.warehouse_id,
                    saved.product_id,
                    amount,
                    "expired",
                    now,
                );
                if let Err(err) = reconciled {
                    error!(
                        warehouse_id = %warehouse_id,
                        batch_number = %saved.batch_number,
                        error = %err,
                        "coarse write-off failed; restoring batch"
                    );
                    self.restore_picks(&[(key, amount)], now);
                    return Err(err);
                }
            }

            warn!(
                warehouse_id = %warehouse_id,
                product_id = %saved.product_id,
                batch_number = %saved.batch_number,
                quantity = amount,
                "expired batch written off"
            );
            written.push(saved);
        }
        Ok(written)
    }

    /// Batches with free units expiring within `days` (not yet expired). A
    /// `days` too large to represent leaves the window open-ended.
    pub fn get_expiring_stock(&self, warehouse_id: WarehouseId, days: i64, now: DateTime<Utc>) -> InventoryResult<Vec<BatchStock>> {
        let until = horizon(now, days);
        let mut batches: Vec<BatchStock> = self
            .batches
            .list_by_warehouse(warehouse_id)?
            .into_iter()
            .filter(|b| b.available > 0 && b.expiry_date.is_some_and(|e| e > now && until.is_none_or(|h| e <= h)))
            .collect();
        batches.sort_by(fefo_order);
        Ok(batches)
    }

    /// Batches past expiry that still hold units, reserved ones included.
    pub fn get_expired_stock(&self, warehouse_id: WarehouseId, now: DateTime<Utc>) -> InventoryResult<Vec<BatchStock>> {
        let mut batches: Vec<BatchStock> = self
            .batches
            .list_by_warehouse(warehouse_id)?
            .into_iter()
            .filter(|b| b.quantity > 0 && b.has_expired(now))
            .collect();
        batches.sort_by(fefo_order);
        Ok(batches)
    }

    /// Read-decide-write on one batch row with optimistic retries.
    /// Returns the row before and after the write.
    fn update_batch<F>(
        &self,
        key: &BatchKey,
        op: &'static str,
        decide: F,
    ) -> InventoryResult<(Option<BatchStock>, BatchStock)>
    where
        F: Fn(Option<&BatchStock>) -> InventoryResult<BatchStock>,
    {
        for attempt in 0..=self.max_write_retries {
            let current = self.batches.get(key)?;
            let next = decide(current.as_ref())?;
            let expected = current
                .as_ref()
                .map_or(ExpectedVersion::Absent, Versioned::expected_version);
            match self.batches.save(next, expected) {
                Ok(saved) => return Ok((current, saved)),
                Err(err) if err.is_concurrency() => {
                    debug!(op, attempt, batch_number = %key.batch_number, "batch write conflict; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        warn!(op, batch_number = %key.batch_number, "giving up on contended batch row");
        Err(InventoryError::conflict(format!(
            "{op} on batch {}: row still contended after {} attempts",
            key.batch_number,
            self.max_write_retries + 1
        )))
    }

    fn undo_receipt(&self, saved: &BatchStock, created: bool, quantity: i64, at: DateTime<Utc>) {
        let key = saved.batch_key();
        if created && self.batches.remove(&key, saved.expected_version()).is_ok() {
            return;
        }
        let result = self.update_batch(&key, "undo_receipt", |current| match current {
            Some(b) => b.consume(quantity, at),
            None => Err(InventoryError::BatchNotFound(saved.id)),
        });
        if let Err(err) = result {
            error!(batch_number = %key.batch_number, error = %err, "failed to undo batch receipt");
        }
    }

    fn restore_picks(&self, picks: &[(BatchKey, i64)], at: DateTime<Utc>) {
        for (key, quantity) in picks {
            let result = self.update_batch(key, "restore", |current| match current {
                Some(b) => b.restore(*quantity, at),
                None => Err(InventoryError::conflict(format!("batch {} vanished", key.batch_number))),
            });
            if let Err(err) = result {
                error!(
                    batch_number = %key.batch_number,
                    quantity,
                    error = %err,
                    "failed to restore batch; batch and stock disagree"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use stockflow_inventory::{AlertType, BatchStatus, MovementQuery, MovementType};

    use crate::alerts::AlertQuery;
    use crate::store::{
        InMemoryAlertStore, InMemoryBatchStore, InMemoryMovementJournal, InMemoryStockStore,
    };

    type TestTracker = BatchExpiryTracker<Arc<InMemoryBatchStore>, Arc<InMemoryAlertStore>>;
    type TestLedger = StockLedger<Arc<InMemoryStockStore>, Arc<InMemoryMovementJournal>>;

    struct Fixture {
        tracker: TestTracker,
        engine: Arc<ExpiryAlertEngine<Arc<InMemoryBatchStore>, Arc<InMemoryAlertStore>>>,
        ledger: Arc<TestLedger>,
        wh: WarehouseId,
        product: ProductId,
        now: DateTime<Utc>,
    }

    fn fixture(config: ExpiryConfig) -> Fixture {
        let batches = Arc::new(InMemoryBatchStore::new());
        let engine = Arc::new(ExpiryAlertEngine::new(
            batches.clone(),
            Arc::new(InMemoryAlertStore::new()),
            config,
        ));
        let ledger = Arc::new(StockLedger::new(
            Arc::new(InMemoryStockStore::new()),
            Arc::new(InMemoryMovementJournal::new()),
        ));
        let tracker = BatchExpiryTracker::new(batches, engine.clone()).with_reconciler(ledger.clone());
        Fixture {
            tracker,
            engine,
            ledger,
            wh: WarehouseId::new(),
            product: ProductId::new(),
            now: Utc::now(),
        }
    }

    fn receipt(f: &Fixture, number: &str, quantity: i64, expires_in_days: Option<i64>) -> ReceiveBatch {
        ReceiveBatch {
            warehouse_id: f.wh,
            product_id: f.product,
            sku: "SKU-B".to_string(),
            batch_number: number.to_string(),
            lot_number: None,
            quantity,
            expiry_date: expires_in_days.map(|d| f.now + Duration::days(d) + Duration::hours(1)),
            cost_price: Decimal::new(500, 2),
            location: Some("A1".to_string()),
            occurred_at: f.now,
        }
    }

    fn consume(f: &Fixture, quantity: i64) -> ConsumeFefo {
        ConsumeFefo {
            warehouse_id: f.wh,
            product_id: f.product,
            quantity,
            document: Some(DocumentRef::new("pick", "P-1")),
            occurred_at: f.now,
        }
    }

    #[test]
    fn receipt_tops_up_and_mirrors_onto_stock() {
        let f = fixture(ExpiryConfig::default());
        f.tracker.receive_batch(&receipt(&f, "B1", 10, Some(60))).unwrap();
        let topped = f.tracker.receive_batch(&receipt(&f, "B1", 5, Some(60))).unwrap();
        assert_eq!(topped.quantity, 15);

        let err = f.tracker.receive_batch(&receipt(&f, "B1", 5, Some(90))).unwrap_err();
        assert!(matches!(err, InventoryError::BatchExpiryMismatch { .. }));

        assert_eq!(f.ledger.get_stock(f.wh, f.product).unwrap().quantity, 15);
    }

    #[test]
    fn receipt_of_a_short_dated_batch_raises_an_alert() {
        let f = fixture(ExpiryConfig::default());
        f.tracker.receive_batch(&receipt(&f, "SHORT", 4, Some(3))).unwrap();

        let alerts = f.engine.list_alerts(&AlertQuery::default()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Critical);
        assert_eq!(alerts[0].days_left, 3);
    }

    #[test]
    fn consume_walks_batches_in_expiry_order() {
        let f = fixture(ExpiryConfig::default());
        f.tracker.receive_batch(&receipt(&f, "A", 10, Some(10))).unwrap();
        f.tracker.receive_batch(&receipt(&f, "B", 5, Some(20))).unwrap();

        let picks = f.tracker.consume_fefo(&consume(&f, 12)).unwrap();
        let summary: Vec<_> = picks.iter().map(|p| (p.batch_number.as_str(), p.quantity)).collect();
        assert_eq!(summary, vec![("A", 10), ("B", 2)]);

        let a = f.tracker.get_batch(&BatchKey {
            warehouse_id: f.wh,
            product_id: f.product,
            batch_number: "A".to_string(),
        });
        assert_eq!(a.unwrap().unwrap().status, BatchStatus::Depleted);
        assert_eq!(f.ledger.get_stock(f.wh, f.product).unwrap().quantity, 3);
    }

    #[test]
    fn insufficient_pick_leaves_everything_untouched() {
        let f = fixture(ExpiryConfig::default());
        f.tracker.receive_batch(&receipt(&f, "A", 10, Some(10))).unwrap();

        let err = f.tracker.consume_fefo(&consume(&f, 11)).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));

        let remaining = f.tracker.get_fefo_stock(f.wh, f.product, 10, f.now).unwrap();
        assert_eq!(remaining[0].available, 10);
        assert_eq!(f.ledger.get_stock(f.wh, f.product).unwrap().quantity, 10);
    }

    #[test]
    fn failed_coarse_shipment_restores_the_batches() {
        let f = fixture(ExpiryConfig::default());
        f.tracker.receive_batch(&receipt(&f, "A", 10, Some(10))).unwrap();
        f.ledger
            .hold(stockflow_inventory::StockKey::new(f.wh, f.product), 8, f.now)
            .unwrap();

        let err = f.tracker.consume_fefo(&consume(&f, 5)).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        let batches = f.tracker.get_fefo_stock(f.wh, f.product, 10, f.now).unwrap();
        assert_eq!(batches[0].quantity, 10);
    }

    #[test]
    fn write_off_is_opt_in_and_reconciles() {
        let off = fixture(ExpiryConfig::default());
        off.tracker.receive_batch(&receipt(&off, "OLD", 10, Some(1))).unwrap();
        let later = off.now + Duration::days(3);
        assert!(off.tracker.auto_write_off_expired(off.wh, later).unwrap().is_empty());

        let f = fixture(ExpiryConfig::default().with_auto_write_off(true));
        f.tracker.receive_batch(&receipt(&f, "OLD", 10, Some(1))).unwrap();
        f.tracker.receive_batch(&receipt(&f, "NEW", 6, Some(40))).unwrap();
        let later = f.now + Duration::days(3);

        assert_eq!(f.tracker.get_expired_stock(f.wh, later).unwrap().len(), 1);
        let written = f.tracker.auto_write_off_expired(f.wh, later).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].available, 0);
        assert_eq!(written[0].status, BatchStatus::Depleted);

        assert_eq!(f.ledger.get_stock(f.wh, f.product).unwrap().quantity, 6);
        let query = MovementQuery {
            movement_type: Some(MovementType::WriteOff),
            ..MovementQuery::for_warehouse(f.wh)
        };
        let entries = f.ledger.movement_history(&query).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].movement.quantity, 10);
    }

    #[test]
    fn expiring_window_excludes_expired_and_distant_batches() {
        let f = fixture(ExpiryConfig::default());
        f.tracker.receive_batch(&receipt(&f, "SOON", 3, Some(5))).unwrap();
        f.tracker.receive_batch(&receipt(&f, "LATER", 3, Some(50))).unwrap();
        f.tracker.receive_batch(&receipt(&f, "NEVER", 3, None)).unwrap();

        let soon = f.tracker.get_expiring_stock(f.wh, 30, f.now).unwrap();
        assert_eq!(soon.len(), 1);
        assert_eq!(soon[0].batch_number, "SOON");
        assert!(f.tracker.get_expired_stock(f.wh, f.now).unwrap().is_empty());

        let unbounded = f.tracker.get_expiring_stock(f.wh, 10_000_000_000, f.now).unwrap();
        let numbers: Vec<_> = unbounded.iter().map(|b| b.batch_number.as_str()).collect();
        assert_eq!(numbers, vec!["SOON", "LATER"]);
    }

    struct RefusingReconciler;

    impl StockReconciler for RefusingReconciler {
        fn receive_units(&self, _: &BatchStock, _: i64, _: DateTime<Utc>) -> InventoryResult<()> {
            Err(InventoryError::storage("ledger offline"))
        }

        fn consume_units(
            &self,
            _: WarehouseId,
            _: ProductId,
            _: i64,
            _: Option<DocumentRef>,
            _: DateTime<Utc>,
        ) -> InventoryResult<()> {
            Err(InventoryError::storage("ledger offline"))
        }

        fn write_off_units(&self, _: WarehouseId, _: ProductId, _: i64, _: &str, _: DateTime<Utc>) -> InventoryResult<()> {
            Err(InventoryError::storage("ledger offline"))
        }
    }

    #[test]
    fn failed_coarse_receipt_removes_the_new_batch() {
        let f = fixture(ExpiryConfig::default());
        let batches = Arc::new(InMemoryBatchStore::new());
        let engine = Arc::new(ExpiryAlertEngine::new(
            batches.clone(),
            Arc::new(InMemoryAlertStore::new()),
            ExpiryConfig::default(),
        ));
        let tracker = BatchExpiryTracker::new(batches.clone(), engine).with_reconciler(Arc::new(RefusingReconciler));

        let cmd = receipt(&f, "B1", 10, Some(60));
        assert!(matches!(tracker.receive_batch(&cmd), Err(InventoryError::Storage(_))));
        assert!(batches.list(f.wh, f.product).unwrap().is_empty());
    }

    #[test]
    fn fifo_when_fefo_disabled() {
        let config = ExpiryConfig {
            fefo_enabled: false,
            ..ExpiryConfig::default()
        };
        let f = fixture(config);
        let mut late_cmd = receipt(&f, "LATE_EXPIRY", 5, Some(80));
        late_cmd.occurred_at = f.now - Duration::days(2);
        f.tracker.receive_batch(&late_cmd).unwrap();
        f.tracker.receive_batch(&receipt(&f, "EARLY_EXPIRY", 5, Some(10))).unwrap();

        let picks = f.tracker.allocate_fefo(f.wh, f.product, 5, f.now).unwrap();
        assert_eq!(picks[0].batch_number, "LATE_EXPIRY");
    }
}
