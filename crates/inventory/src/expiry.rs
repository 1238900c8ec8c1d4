//! Expiry thresholds, alerts and the dashboard rollup.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{AlertId, BatchId, ProductId, UserId, WarehouseId};

use crate::batch::BatchStock;
use crate::error::{InventoryError, InventoryResult};

pub const DEFAULT_CRITICAL_DAYS: i64 = 7;
pub const DEFAULT_WARNING_DAYS: i64 = 30;
pub const DEFAULT_INFO_DAYS: i64 = 90;
/// Upper bound for any configured threshold.
pub const MAX_THRESHOLD_DAYS: i64 = 36_500;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryConfig {
    pub critical_days: i64,
    pub warning_days: i64,
    pub info_days: i64,
    /// Write off expired batches during the sweep.
    pub auto_write_off: bool,
    /// Never hand out batches past their expiry date.
    pub block_expired: bool,
    pub fefo_enabled: bool,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            critical_days: DEFAULT_CRITICAL_DAYS,
            warning_days: DEFAULT_WARNING_DAYS,
            info_days: DEFAULT_INFO_DAYS,
            auto_write_off: false,
            block_expired: true,
            fefo_enabled: true,
        }
    }
}

impl ExpiryConfig {
    /// Replace unset (zero or negative) thresholds with the defaults and cap
    /// the rest at `MAX_THRESHOLD_DAYS`.
    pub fn normalized(mut self) -> Self {
        self.critical_days = threshold_or(self.critical_days, DEFAULT_CRITICAL_DAYS);
        self.warning_days = threshold_or(self.warning_days, DEFAULT_WARNING_DAYS);
        self.info_days = threshold_or(self.info_days, DEFAULT_INFO_DAYS);
        self
    }

    pub fn with_auto_write_off(mut self, enabled: bool) -> Self {
        self.auto_write_off = enabled;
        self
    }

    pub fn with_block_expired(mut self, enabled: bool) -> Self {
        self.block_expired = enabled;
        self
    }
}

fn threshold_or(days: i64, default: i64) -> i64 {
    if days <= 0 {
        default
    } else {
        days.min(MAX_THRESHOLD_DAYS)
    }
}

/// `now + days`, or `None` when the result is out of range (no horizon).
pub fn horizon(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|d| now.checked_add_signed(d))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ExpiringSoon,
    Critical,
    Expired,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Resolved,
}

/// Whole days until `expiry_date`, rounded toward negative infinity.
pub fn days_left(expiry_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiry_date - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// The one threshold rule shared by receipt-time checks and the bulk sweep.
pub fn classify(days_left: i64, config: &ExpiryConfig) -> Option<AlertType> {
    if days_left <= 0 {
        Some(AlertType::Expired)
    } else if days_left <= config.critical_days {
        Some(AlertType::Critical)
    } else if days_left <= config.warning_days {
        Some(AlertType::ExpiringSoon)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub id: AlertId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sku: String,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub expiry_date: DateTime<Utc>,
    pub quantity: i64,
    pub days_left: i64,
    pub alert_type: AlertType,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ExpiryAlert {
    /// Build the alert a batch deserves right now, if any.
    pub fn evaluate(batch: &BatchStock, config: &ExpiryConfig, now: DateTime<Utc>) -> Option<Self> {
        let expiry_date = batch.expiry_date?;
        let days_left = days_left(expiry_date, now);
        let alert_type = classify(days_left, config)?;
        Some(Self {
            id: AlertId::new(),
            warehouse_id: batch.warehouse_id,
            product_id: batch.product_id,
            sku: batch.sku.clone(),
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            expiry_date,
            quantity: batch.available,
            days_left,
            alert_type,
            status: AlertStatus::Pending,
            created_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status != AlertStatus::Resolved
    }

    pub fn acknowledge(&self, user_id: UserId, at: DateTime<Utc>) -> InventoryResult<Self> {
        self.ensure_open()?;
        let mut next = self.clone();
        next.status = AlertStatus::Acknowledged;
        next.acknowledged_at = Some(at);
        next.acknowledged_by = Some(user_id);
        Ok(next)
    }

    pub fn resolve(&self, at: DateTime<Utc>) -> InventoryResult<Self> {
        self.ensure_open()?;
        let mut next = self.clone();
        next.status = AlertStatus::Resolved;
        next.resolved_at = Some(at);
        Ok(next)
    }

    fn ensure_open(&self) -> InventoryResult<()> {
        if !self.is_open() {
            return Err(InventoryError::InvalidAlertState {
                alert_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Per-tier counts and free-stock value for one warehouse. The info tier
/// (past `warning_days`, within `info_days`) is reported but never alerted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryDashboard {
    pub warehouse_id: WarehouseId,
    pub expired_count: usize,
    pub expired_value: Decimal,
    pub critical_count: usize,
    pub critical_value: Decimal,
    pub warning_count: usize,
    pub warning_value: Decimal,
    pub info_count: usize,
    pub info_value: Decimal,
    pub pending_alerts: usize,
    pub last_checked: DateTime<Utc>,
}

impl ExpiryDashboard {
    pub fn build(
        warehouse_id: WarehouseId,
        batches: &[BatchStock],
        alerts: &[ExpiryAlert],
        config: &ExpiryConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let mut dashboard = Self {
            warehouse_id,
            expired_count: 0,
            expired_value: Decimal::ZERO,
            critical_count: 0,
            critical_value: Decimal::ZERO,
            warning_count: 0,
            warning_value: Decimal::ZERO,
            info_count: 0,
            info_value: Decimal::ZERO,
            pending_alerts: 0,
            last_checked: now,
        };

        for batch in batches.iter().filter(|b| b.warehouse_id == warehouse_id && b.available > 0) {
            let Some(expiry_date) = batch.expiry_date else {
                continue;
            };
            let value = Decimal::from(batch.available) * batch.cost_price;
            let days = days_left(expiry_date, now);
            match classify(days, config) {
                Some(AlertType::Expired) => {
                    dashboard.expired_count += 1;
                    dashboard.expired_value += value;
                }
                Some(AlertType::Critical) => {
                    dashboard.critical_count += 1;
                    dashboard.critical_value += value;
                }
                Some(AlertType::ExpiringSoon) => {
                    dashboard.warning_count += 1;
                    dashboard.warning_value += value;
                }
                None if days <= config.info_days => {
                    dashboard.info_count += 1;
                    dashboard.info_value += value;
                }
                None => {}
            }
        }

        dashboard.pending_alerts = alerts
            .iter()
            .filter(|a| a.warehouse_id == warehouse_id && a.status == AlertStatus::Pending)
            .count();
        dashboard
    }
}
