//! Expiry alerting over batch stock.
//!
//! Receipt-time checks and the bulk sweep share `ExpiryAlert::evaluate`, so a
//! batch always lands in the same tier whichever path looks at it.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use stockflow_core::{AlertId, UserId, WarehouseId};
use stockflow_inventory::{
    AlertStatus, BatchStock, ExpiryAlert, ExpiryConfig, ExpiryDashboard, InventoryError,
    InventoryResult, fefo_order, horizon,
};

use crate::store::{AlertStore, BatchStore};

/// Filter for `list_alerts`. `limit` of `None` or 0 is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub status: Option<AlertStatus>,
    pub limit: Option<usize>,
}

pub struct ExpiryAlertEngine<B, A> {
    batches: B,
    alerts: A,
    config: ExpiryConfig,
}

impl<B, A> ExpiryAlertEngine<B, A>
where
    B: BatchStore,
    A: AlertStore,
{
    pub fn new(batches: B, alerts: A, config: ExpiryConfig) -> Self {
        Self {
            batches,
            alerts,
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &ExpiryConfig {
        &self.config
    }

    /// Raise the alert a batch deserves now, unless an open one of the same
    /// tier already exists. Returns the stored alert, if one was created.
    pub fn evaluate_batch(&self, batch: &BatchStock, now: DateTime<Utc>) -> InventoryResult<Option<ExpiryAlert>> {
        let Some(alert) = ExpiryAlert::evaluate(batch, &self.config, now) else {
            return Ok(None);
        };
        if !self.alerts.insert_if_new(alert.clone())? {
            debug!(batch_id = %batch.id, alert_type = ?alert.alert_type, "open alert already exists");
            return Ok(None);
        }
        info!(
            alert_id = %alert.id,
            warehouse_id = %alert.warehouse_id,
            batch_number = %alert.batch_number,
            alert_type = ?alert.alert_type,
            days_left = alert.days_left,
            "expiry alert raised"
        );
        Ok(Some(alert))
    }

    /// Sweep every batch in the warehouse expiring within `warning_days`
    /// (including already expired ones). Returns newly raised alerts.
    pub fn check_expiry_alerts(&self, warehouse_id: WarehouseId, now: DateTime<Utc>) -> InventoryResult<Vec<ExpiryAlert>> {
        let until = horizon(now, self.config.warning_days);
        let mut due: Vec<BatchStock> = self
            .batches
            .list_by_warehouse(warehouse_id)?
            .into_iter()
            .filter(|b| b.available > 0 && b.expiry_date.is_some_and(|e| until.is_none_or(|h| e <= h)))
            .collect();
        due.sort_by(fefo_order);

        let mut raised = Vec::new();
        for batch in &due {
            if let Some(alert) = self.evaluate_batch(batch, now)? {
                raised.push(alert);
            }
        }
        debug!(
            warehouse_id = %warehouse_id,
            scanned = due.len(),
            raised = raised.len(),
            "expiry sweep finished"
        );
        Ok(raised)
    }

    pub fn get_alert(&self, id: AlertId) -> InventoryResult<ExpiryAlert> {
        self.alerts.get(id)?.ok_or(InventoryError::AlertNotFound(id))
    }

    pub fn acknowledge_alert(&self, id: AlertId, user_id: UserId, now: DateTime<Utc>) -> InventoryResult<ExpiryAlert> {
        let current = self.get_alert(id)?;
        let next = current.acknowledge(user_id, now)?;
        self.swap(&current, next)
    }

    pub fn resolve_alert(&self, id: AlertId, now: DateTime<Utc>) -> InventoryResult<ExpiryAlert> {
        let current = self.get_alert(id)?;
        let next = current.resolve(now)?;
        self.swap(&current, next)
    }

    pub fn list_alerts(&self, query: &AlertQuery) -> InventoryResult<Vec<ExpiryAlert>> {
        let limit = query.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
        Ok(self
            .alerts
            .list(query.warehouse_id)?
            .into_iter()
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .take(limit)
            .collect())
    }

    pub fn expiry_dashboard(&self, warehouse_id: WarehouseId, now: DateTime<Utc>) -> InventoryResult<ExpiryDashboard> {
        let batches = self.batches.list_by_warehouse(warehouse_id)?;
        let alerts = self.alerts.list(Some(warehouse_id))?;
        Ok(ExpiryDashboard::build(warehouse_id, &batches, &alerts, &self.config, now))
    }

    fn swap(&self, current: &ExpiryAlert, next: ExpiryAlert) -> InventoryResult<ExpiryAlert> {
        if self.alerts.compare_and_set(next.clone(), current.status)? {
            info!(alert_id = %next.id, status = ?next.status, "expiry alert updated");
            return Ok(next);
        }
        let latest = self.get_alert(current.id)?;
        Err(InventoryError::InvalidAlertState {
            alert_id: latest.id,
            status: latest.status,
        })
    }
}
