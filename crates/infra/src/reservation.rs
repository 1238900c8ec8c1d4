//! Time-bounded holds on stock for pending orders.
//!
//! A reservation and its stock hold change together:
//!
//! - reserve: hold stock, then store the reservation (hold released if the store fails)
//! - release / expire: flip status from `active` (compare-and-set), then drop the hold
//! - fulfill: flip status from `active`, then ship the held units
//!
//! The status compare-and-set decides which of several concurrent callers
//! wins; the loser never touches stock. If the stock step fails after the
//! status flipped, the status is flipped back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use stockflow_core::{OrderId, ReservationId};
use stockflow_inventory::{
    InventoryError, InventoryResult, ReservationStatus, ReserveStock, StockReservation,
    ensure_positive,
};

use crate::ledger::StockLedger;
use crate::store::{MovementJournal, ReservationStore, StockStore};

pub struct ReservationManager<S, J, R> {
    ledger: Arc<StockLedger<S, J>>,
    reservations: R,
}

impl<S, J, R> ReservationManager<S, J, R>
where
    S: StockStore,
    J: MovementJournal,
    R: ReservationStore,
{
    pub fn new(ledger: Arc<StockLedger<S, J>>, reservations: R) -> Self {
        Self {
            ledger,
            reservations,
        }
    }

    pub fn ledger(&self) -> &StockLedger<S, J> {
        &self.ledger
    }

    pub fn reserve_stock(&self, cmd: &ReserveStock) -> InventoryResult<StockReservation> {
        ensure_positive(cmd.quantity)?;
        let key = cmd.stock_key();
        self.ledger.hold(key, cmd.quantity, cmd.occurred_at)?;

        let reservation =
            StockReservation::new(cmd.order_id, key, cmd.quantity, cmd.expires_at, cmd.occurred_at);
        if let Err(err) = self.reservations.insert(reservation.clone()) {
            warn!(
                order_id = %cmd.order_id,
                warehouse_id = %cmd.warehouse_id,
                product_id = %cmd.product_id,
                error = %err,
                "reservation not stored; releasing hold"
            );
            if let Err(undo) = self.ledger.release_hold(key, cmd.quantity, cmd.occurred_at) {
                error!(
                    order_id = %cmd.order_id,
                    error = %undo,
                    "failed to release orphaned hold"
                );
            }
            return Err(err.into());
        }

        info!(
            reservation_id = %reservation.id,
            order_id = %cmd.order_id,
            warehouse_id = %cmd.warehouse_id,
            product_id = %cmd.product_id,
            quantity = cmd.quantity,
            expires_at = %cmd.expires_at,
            "stock reserved"
        );
        Ok(reservation)
    }

    pub fn get_reservation(&self, id: ReservationId) -> InventoryResult<StockReservation> {
        self.reservations
            .get(id)?
            .ok_or(InventoryError::ReservationNotFound(id))
    }

    /// Cancel a hold. Releasing a reservation that is no longer active is a no-op.
    pub fn release_reservation(
        &self,
        id: ReservationId,
        at: DateTime<Utc>,
    ) -> InventoryResult<StockReservation> {
        let current = self.get_reservation(id)?;
        if !current.is_active() {
            debug!(reservation_id = %id, status = ?current.status, "release of inactive reservation ignored");
            return Ok(current);
        }
        match self.close(&current, ReservationStatus::Cancelled, at)? {
            Some(cancelled) => {
                info!(reservation_id = %id, order_id = %cancelled.order_id, "reservation released");
                Ok(cancelled)
            }
            // Lost the race to another terminal transition; that one already settled the hold.
            None => self.get_reservation(id),
        }
    }

    /// Ship the held units. Only an active reservation can be fulfilled.
    pub fn fulfill_reservation(
        &self,
        id: ReservationId,
        at: DateTime<Utc>,
    ) -> InventoryResult<StockReservation> {
        let current = self.get_reservation(id)?;
        let fulfilled = current.transition(ReservationStatus::Fulfilled, at)?;

        if !self
            .reservations
            .compare_and_set(fulfilled.clone(), ReservationStatus::Active)?
        {
            let latest = self.get_reservation(id)?;
            return Err(InventoryError::ReservationNotActive {
                reservation_id: id,
                status: latest.status,
            });
        }

        if let Err(err) =
            self.ledger
                .fulfill_hold(current.stock_key(), current.quantity, current.order_id, at)
        {
            self.revert(&fulfilled, &current);
            return Err(err);
        }

        info!(
            reservation_id = %id,
            order_id = %current.order_id,
            warehouse_id = %current.warehouse_id,
            product_id = %current.product_id,
            quantity = current.quantity,
            "reservation fulfilled"
        );
        Ok(fulfilled)
    }

    /// Expire every active reservation whose `expires_at` is at or before `now`.
    ///
    /// Failures on individual reservations are logged and skipped so one bad
    /// row cannot stall the sweep. Returns the reservations actually expired.
    pub fn expire_reservations(&self, now: DateTime<Utc>) -> InventoryResult<Vec<StockReservation>> {
        let candidates = self.reservations.list_expired(now)?;
        let mut expired = Vec::with_capacity(candidates.len());

        for reservation in candidates {
            match self.close(&reservation, ReservationStatus::Expired, now) {
                Ok(Some(done)) => expired.push(done),
                Ok(None) => {}
                Err(err) => warn!(
                    reservation_id = %reservation.id,
                    error = %err,
                    "failed to expire reservation"
                ),
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired stale reservations");
        }
        Ok(expired)
    }

    pub fn reservations_for_order(&self, order_id: OrderId) -> InventoryResult<Vec<StockReservation>> {
        Ok(self.reservations.list_by_order(order_id)?)
    }

    /// Flip an active reservation to `to` and drop its hold.
    /// `Ok(None)` means another caller closed it first.
    fn close(
        &self,
        current: &StockReservation,
        to: ReservationStatus,
        at: DateTime<Utc>,
    ) -> InventoryResult<Option<StockReservation>> {
        let next = current.transition(to, at)?;
        if !self
            .reservations
            .compare_and_set(next.clone(), ReservationStatus::Active)?
        {
            return Ok(None);
        }

        if let Err(err) = self
            .ledger
            .release_hold(current.stock_key(), current.quantity, at)
        {
            self.revert(&next, current);
            return Err(err);
        }
        Ok(Some(next))
    }

    fn revert(&self, closed: &StockReservation, previous: &StockReservation) {
        match self.reservations.compare_and_set(previous.clone(), closed.status) {
            Ok(true) => {}
            Ok(false) | Err(_) => error!(
                reservation_id = %previous.id,
                status = ?closed.status,
                "could not restore reservation after failed stock update"
            ),
        }
    }
}
