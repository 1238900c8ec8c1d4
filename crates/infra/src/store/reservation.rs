use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use stockflow_core::{OrderId, ReservationId};
use stockflow_inventory::{ReservationStatus, StockReservation};

use super::StoreError;

/// Reservation records.
///
/// Status changes go through `compare_and_set`, which replaces the stored
/// record only while its status still equals `expected`; that check is the
/// linearization point between concurrent release, fulfill and expiry.
pub trait ReservationStore: Send + Sync {
    fn insert(&self, reservation: StockReservation) -> Result<(), StoreError>;

    fn get(&self, id: ReservationId) -> Result<Option<StockReservation>, StoreError>;

    /// Returns `false` (and writes nothing) when the stored status differs from `expected`.
    fn compare_and_set(
        &self,
        next: StockReservation,
        expected: ReservationStatus,
    ) -> Result<bool, StoreError>;

    /// Active reservations whose `expires_at` is at or before `now`.
    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<StockReservation>, StoreError>;

    fn list_by_order(&self, order_id: OrderId) -> Result<Vec<StockReservation>, StoreError>;
}

impl<R> ReservationStore for Arc<R>
where
    R: ReservationStore + ?Sized,
{
    fn insert(&self, reservation: StockReservation) -> Result<(), StoreError> {
        (**self).insert(reservation)
    }

    fn get(&self, id: ReservationId) -> Result<Option<StockReservation>, StoreError> {
        (**self).get(id)
    }

    fn compare_and_set(
        &self,
        next: StockReservation,
        expected: ReservationStatus,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_set(next, expected)
    }

    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<StockReservation>, StoreError> {
        (**self).list_expired(now)
    }

    fn list_by_order(&self, order_id: OrderId) -> Result<Vec<StockReservation>, StoreError> {
        (**self).list_by_order(order_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    inner: RwLock<HashMap<ReservationId, StockReservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn insert(&self, reservation: StockReservation) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if map.contains_key(&reservation.id) {
            return Err(StoreError::Duplicate(format!("reservation {}", reservation.id)));
        }
        map.insert(reservation.id, reservation);
        Ok(())
    }

    fn get(&self, id: ReservationId) -> Result<Option<StockReservation>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn compare_and_set(
        &self,
        next: StockReservation,
        expected: ReservationStatus,
    ) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        match map.get_mut(&next.id) {
            Some(current) if current.status == expected => {
                *current = next;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(format!("reservation {}", next.id))),
        }
    }

    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<StockReservation>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        let mut expired: Vec<_> = map.values().filter(|r| r.is_expired_at(now)).cloned().collect();
        expired.sort_by_key(|r| (r.expires_at, r.id));
        Ok(expired)
    }

    fn list_by_order(&self, order_id: OrderId) -> Result<Vec<StockReservation>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        let mut rows: Vec<_> = map.values().filter(|r| r.order_id == order_id).cloned().collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockflow_core::{ProductId, WarehouseId};
    use stockflow_inventory::StockKey;

    fn reservation(expires_in: Duration) -> StockReservation {
        let now = Utc::now();
        StockReservation::new(
            OrderId::new(),
            StockKey::new(WarehouseId::new(), ProductId::new()),
            3,
            now + expires_in,
            now,
        )
    }

    #[test]
    fn compare_and_set_only_wins_once() {
        let store = InMemoryReservationStore::new();
        let r = reservation(Duration::minutes(5));
        store.insert(r.clone()).unwrap();

        let cancelled = r.transition(ReservationStatus::Cancelled, Utc::now()).unwrap();
        let fulfilled = r.transition(ReservationStatus::Fulfilled, Utc::now()).unwrap();

        assert!(store.compare_and_set(cancelled, ReservationStatus::Active).unwrap());
        assert!(!store.compare_and_set(fulfilled, ReservationStatus::Active).unwrap());
        assert_eq!(store.get(r.id).unwrap().unwrap().status, ReservationStatus::Cancelled);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = InMemoryReservationStore::new();
        let r = reservation(Duration::minutes(5));
        store.insert(r.clone()).unwrap();
        assert!(matches!(store.insert(r), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn list_expired_skips_future_and_terminal() {
        let store = InMemoryReservationStore::new();
        let past = reservation(Duration::minutes(-1));
        let future = reservation(Duration::minutes(10));
        let done = reservation(Duration::minutes(-1))
            .transition(ReservationStatus::Fulfilled, Utc::now())
            .unwrap();
        for r in [past.clone(), future, done] {
            store.insert(r).unwrap();
        }

        let expired = store.list_expired(Utc::now()).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, past.id);
    }
}
