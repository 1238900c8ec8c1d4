use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockflow_core::{AlertId, WarehouseId};
use stockflow_inventory::{AlertStatus, ExpiryAlert};

use super::StoreError;

/// Expiry alert records.
pub trait AlertStore: Send + Sync {
    /// Insert unless an open (non-resolved) alert already exists for the same
    /// batch and tier. Returns whether the alert was stored.
    fn insert_if_new(&self, alert: ExpiryAlert) -> Result<bool, StoreError>;

    fn get(&self, id: AlertId) -> Result<Option<ExpiryAlert>, StoreError>;

    /// Replace the alert only while its stored status equals `expected`.
    fn compare_and_set(&self, next: ExpiryAlert, expected: AlertStatus) -> Result<bool, StoreError>;

    /// Newest first. `None` lists every warehouse.
    fn list(&self, warehouse_id: Option<WarehouseId>) -> Result<Vec<ExpiryAlert>, StoreError>;
}

impl<A> AlertStore for Arc<A>
where
    A: AlertStore + ?Sized,
{
    fn insert_if_new(&self, alert: ExpiryAlert) -> Result<bool, StoreError> {
        (**self).insert_if_new(alert)
    }

    fn get(&self, id: AlertId) -> Result<Option<ExpiryAlert>, StoreError> {
        (**self).get(id)
    }

    fn compare_and_set(&self, next: ExpiryAlert, expected: AlertStatus) -> Result<bool, StoreError> {
        (**self).compare_and_set(next, expected)
    }

    fn list(&self, warehouse_id: Option<WarehouseId>) -> Result<Vec<ExpiryAlert>, StoreError> {
        (**self).list(warehouse_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    inner: RwLock<HashMap<AlertId, ExpiryAlert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertStore for InMemoryAlertStore {
    fn insert_if_new(&self, alert: ExpiryAlert) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let duplicate = map.values().any(|a| {
            a.is_open() && a.batch_id == alert.batch_id && a.alert_type == alert.alert_type
        });
        if duplicate {
            return Ok(false);
        }
        map.insert(alert.id, alert);
        Ok(true)
    }

    fn get(&self, id: AlertId) -> Result<Option<ExpiryAlert>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn compare_and_set(&self, next: ExpiryAlert, expected: AlertStatus) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        match map.get_mut(&next.id) {
            Some(current) if current.status == expected => {
                *current = next;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(format!("alert {}", next.id))),
        }
    }

    fn list(&self, warehouse_id: Option<WarehouseId>) -> Result<Vec<ExpiryAlert>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        let mut alerts: Vec<_> = map
            .values()
            .filter(|a| warehouse_id.is_none_or(|wh| a.warehouse_id == wh))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }
}
