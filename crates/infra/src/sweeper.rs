//! Background reservation expiry.
//!
//! Runs `ReservationManager::expire_reservations` on a fixed interval in a
//! dedicated thread, independent of request traffic.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use stockflow_inventory::InventoryResult;

use crate::config::{DEFAULT_SWEEP_INTERVAL, LedgerConfig};
use crate::reservation::ReservationManager;
use crate::store::{MovementJournal, ReservationStore, StockStore};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// Thread name and log label.
    pub name: String,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            name: "reservation-sweeper".to_string(),
        }
    }
}

impl SweeperConfig {
    pub fn from_ledger_config(config: &LedgerConfig) -> Self {
        Self::default().with_interval(config.sweep_interval)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweeperStats {
    pub sweeps_run: u64,
    pub reservations_expired: u64,
    pub sweep_failures: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

/// Handle to a running sweeper thread.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SweeperStats>>,
}

impl SweeperHandle {
    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> SweeperStats {
        match self.stats.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

pub struct ReservationSweeper<S, J, R> {
    manager: Arc<ReservationManager<S, J, R>>,
}

impl<S, J, R> ReservationSweeper<S, J, R>
where
    S: StockStore + 'static,
    J: MovementJournal + 'static,
    R: ReservationStore + 'static,
{
    pub fn new(manager: Arc<ReservationManager<S, J, R>>) -> Self {
        Self { manager }
    }

    /// One synchronous sweep (for tests or externally scheduled use).
    pub fn run_once(&self, now: DateTime<Utc>) -> InventoryResult<usize> {
        Ok(self.manager.expire_reservations(now)?.len())
    }

    /// Spawn the sweep loop in a background thread.
    pub fn spawn(self, config: SweeperConfig) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(SweeperStats::default()));
        let stats_clone = stats.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || sweeper_loop(self, config, shutdown_rx, stats_clone))
            .expect("failed to spawn reservation sweeper thread");

        SweeperHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }
}

fn sweeper_loop<S, J, R>(
    sweeper: ReservationSweeper<S, J, R>,
    config: SweeperConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<SweeperStats>>,
) where
    S: StockStore + 'static,
    J: MovementJournal + 'static,
    R: ReservationStore + 'static,
{
    info!(sweeper = %config.name, interval_ms = config.interval.as_millis() as u64, "reservation sweeper started");
    let start_time = Instant::now();

    loop {
        match shutdown_rx.recv_timeout(config.interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let now = Utc::now();
        let result = sweeper.run_once(now);

        if let Ok(mut s) = stats.lock() {
            s.sweeps_run += 1;
            s.last_sweep_at = Some(now);
            s.uptime_secs = start_time.elapsed().as_secs();
            match &result {
                Ok(n) => s.reservations_expired += *n as u64,
                Err(_) => s.sweep_failures += 1,
            }
        }

        match result {
            Ok(0) => {}
            Ok(n) => debug!(sweeper = %config.name, expired = n, "sweep finished"),
            Err(e) => error!(sweeper = %config.name, error = %e, "reservation sweep failed"),
        }
    }

    info!(sweeper = %config.name, "reservation sweeper stopped");
}
