//! First-Expired-First-Out batch selection.
//!
//! Selection is pure: it reads batch snapshots and returns which ones (and
//! how much of each) should satisfy a demand. Applying the picks is the
//! tracker's job.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{BatchId, ProductId, WarehouseId};

use crate::batch::BatchStock;
use crate::error::{InventoryError, InventoryResult, ensure_positive};

/// One pick from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: i64,
    pub expiry_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

/// Earliest expiry first; batches without an expiry go last. Ties fall back
/// to receipt time and then batch number so the order is total.
pub fn fefo_order(a: &BatchStock, b: &BatchStock) -> Ordering {
    let by_expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry
        .then_with(|| a.received_at.cmp(&b.received_at))
        .then_with(|| a.batch_number.cmp(&b.batch_number))
}

/// Receipt order only, for warehouses that pick without regard to expiry.
pub fn fifo_order(a: &BatchStock, b: &BatchStock) -> Ordering {
    a.received_at
        .cmp(&b.received_at)
        .then_with(|| a.batch_number.cmp(&b.batch_number))
}

/// Eligible batches in FEFO order, accumulated until `required` is covered.
///
/// The returned batches are the uncapped candidate set: the last one may
/// hold more than is still needed.
pub fn select_fefo(
    warehouse_id: WarehouseId,
    product_id: ProductId,
    batches: &[BatchStock],
    required: i64,
    now: DateTime<Utc>,
    block_expired: bool,
) -> InventoryResult<Vec<BatchStock>> {
    select_batches(warehouse_id, product_id, batches, required, now, block_expired, fefo_order)
}

/// Same selection as `select_fefo` with a caller-chosen pick order.
pub fn select_batches(
    warehouse_id: WarehouseId,
    product_id: ProductId,
    batches: &[BatchStock],
    required: i64,
    now: DateTime<Utc>,
    block_expired: bool,
    order: fn(&BatchStock, &BatchStock) -> Ordering,
) -> InventoryResult<Vec<BatchStock>> {
    ensure_positive(required)?;

    let mut eligible: Vec<&BatchStock> = batches
        .iter()
        .filter(|b| b.warehouse_id == warehouse_id && b.product_id == product_id)
        .filter(|b| b.available > 0)
        .filter(|b| !(block_expired && b.has_expired(now)))
        .collect();

    if eligible.is_empty() {
        return Err(InventoryError::NoValidStock {
            warehouse_id,
            product_id,
        });
    }
    eligible.sort_by(|a, b| order(a, b));

    let mut picked = Vec::new();
    let mut accumulated = 0;
    for batch in eligible {
        if accumulated >= required {
            break;
        }
        accumulated = accumulated.saturating_add(batch.available);
        picked.push(batch.clone());
    }

    if accumulated < required {
        return Err(InventoryError::InsufficientStock {
            warehouse_id,
            product_id,
            requested: required,
            available: accumulated,
        });
    }
    Ok(picked)
}

/// Turn a candidate set into exact picks. Only the last batch is capped.
pub fn allocate(candidates: &[BatchStock], required: i64) -> Vec<BatchAllocation> {
    let mut remaining = required;
    let mut allocations = Vec::with_capacity(candidates.len());
    for batch in candidates {
        if remaining <= 0 {
            break;
        }
        let quantity = batch.available.min(remaining);
        remaining -= quantity;
        allocations.push(BatchAllocation {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity,
            expiry_date: batch.expiry_date,
            location: batch.location.clone(),
        });
    }
    allocations
}
