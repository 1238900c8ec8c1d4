//! In-memory wiring of every ledger service (dev/test).
//!
//! One stock store, journal and batch store are shared by the services that
//! read them, and every journaled movement is published on `bus`.

use std::sync::Arc;

use stockflow_events::{EventEnvelope, InMemoryEventBus};
use stockflow_inventory::StockMovement;

use crate::alerts::ExpiryAlertEngine;
use crate::allocation::AllocationPlanner;
use crate::batch::BatchExpiryTracker;
use crate::config::LedgerConfig;
use crate::ledger::StockLedger;
use crate::reservation::ReservationManager;
use crate::store::{
    InMemoryAlertStore, InMemoryBatchStore, InMemoryMovementJournal, InMemoryReservationStore,
    InMemoryStockStore, InMemoryWarehouseDirectory, PublishingJournal,
};
use crate::sweeper::{ReservationSweeper, SweeperConfig, SweeperHandle};

pub type MovementBus = InMemoryEventBus<EventEnvelope<StockMovement>>;
pub type InMemoryJournal = PublishingJournal<Arc<InMemoryMovementJournal>, Arc<MovementBus>>;
pub type InMemoryLedger = StockLedger<Arc<InMemoryStockStore>, Arc<InMemoryJournal>>;
pub type InMemoryReservations =
    ReservationManager<Arc<InMemoryStockStore>, Arc<InMemoryJournal>, Arc<InMemoryReservationStore>>;
pub type InMemoryPlanner = AllocationPlanner<Arc<InMemoryStockStore>, Arc<InMemoryWarehouseDirectory>>;
pub type InMemoryAlertEngine = ExpiryAlertEngine<Arc<InMemoryBatchStore>, Arc<InMemoryAlertStore>>;
pub type InMemoryBatchTracker = BatchExpiryTracker<Arc<InMemoryBatchStore>, Arc<InMemoryAlertStore>>;

#[derive(Clone)]
pub struct InMemoryServices {
    pub config: LedgerConfig,
    pub bus: Arc<MovementBus>,
    pub journal: Arc<InMemoryMovementJournal>,
    pub ledger: Arc<InMemoryLedger>,
    pub reservations: Arc<InMemoryReservations>,
    pub planner: Arc<InMemoryPlanner>,
    pub alerts: Arc<InMemoryAlertEngine>,
    pub batches: Arc<InMemoryBatchTracker>,
}

impl InMemoryServices {
    pub fn new(config: LedgerConfig) -> Self {
        let stocks = Arc::new(InMemoryStockStore::new());
        let journal = Arc::new(InMemoryMovementJournal::new());
        let bus: Arc<MovementBus> = Arc::new(InMemoryEventBus::new());
        let publishing = Arc::new(PublishingJournal::new(journal.clone(), bus.clone()));

        let ledger = Arc::new(
            StockLedger::new(stocks.clone(), publishing).with_max_write_retries(config.max_write_retries),
        );
        let reservations = Arc::new(ReservationManager::new(
            ledger.clone(),
            Arc::new(InMemoryReservationStore::new()),
        ));
        let planner = Arc::new(AllocationPlanner::new(
            stocks,
            Arc::new(InMemoryWarehouseDirectory::new()),
        ));

        let batch_store = Arc::new(InMemoryBatchStore::new());
        let alerts = Arc::new(ExpiryAlertEngine::new(
            batch_store.clone(),
            Arc::new(InMemoryAlertStore::new()),
            config.expiry.clone(),
        ));
        let batches = Arc::new(
            BatchExpiryTracker::new(batch_store, alerts.clone())
                .with_reconciler(ledger.clone())
                .with_max_write_retries(config.max_write_retries),
        );

        tracing::info!(
            sweep_interval_ms = config.sweep_interval.as_millis() as u64,
            max_write_retries = config.max_write_retries,
            auto_write_off = config.expiry.auto_write_off,
            "in-memory ledger services ready"
        );

        Self {
            config,
            bus,
            journal,
            ledger,
            reservations,
            planner,
            alerts,
            batches,
        }
    }

    pub fn from_env() -> Self {
        Self::new(LedgerConfig::from_env())
    }

    /// Start the reservation expiry sweep at the configured interval.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        ReservationSweeper::new(self.reservations.clone())
            .spawn(SweeperConfig::from_ledger_config(&self.config))
    }
}
