//! Cross-warehouse fulfillment choice.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stockflow_core::{ProductId, WarehouseId};

use crate::stock::Stock;
use crate::warehouse::Warehouse;

/// Outcome of an allocation request. `warehouse_id` is `None` when
/// `available` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub product_id: ProductId,
    pub warehouse_id: Option<WarehouseId>,
    pub quantity: i64,
    pub available: bool,
}

impl AllocationResult {
    pub fn unavailable(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            warehouse_id: None,
            quantity,
            available: false,
        }
    }
}

/// Pick the single warehouse that should satisfy `quantity` units.
///
/// Only warehouses that are active and accept orders are considered; among
/// those holding enough available stock the lowest priority wins, with ties
/// broken by ascending warehouse id so repeated calls agree.
pub fn choose_warehouse(
    product_id: ProductId,
    quantity: i64,
    stocks: &[Stock],
    warehouses: &[Warehouse],
) -> AllocationResult {
    let priorities: HashMap<WarehouseId, i32> = warehouses
        .iter()
        .filter(|w| w.can_fulfill_orders())
        .map(|w| (w.id, w.priority))
        .collect();

    let best = stocks
        .iter()
        .filter(|s| s.product_id == product_id && s.available >= quantity)
        .filter_map(|s| priorities.get(&s.warehouse_id).map(|p| (*p, s.warehouse_id)))
        .min();

    match best {
        Some((_, warehouse_id)) => AllocationResult {
            product_id,
            warehouse_id: Some(warehouse_id),
            quantity,
            available: true,
        },
        None => AllocationResult::unavailable(product_id, quantity),
    }
}

/// Raw physical availability across every stock row, regardless of warehouse flags.
pub fn total_available(stocks: &[Stock]) -> i64 {
    stocks.iter().fold(0i64, |total, s| total.saturating_add(s.available))
}
