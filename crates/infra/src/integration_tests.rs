//! Integration tests across the ledger services.
//!
//! Verifies:
//! - Concurrent reservations never over-commit a row
//! - Transfers leave no trace when the destination cannot be credited
//! - Batch and coarse stock stay reconciled through receipt, pick and write-off
//! - Journaled movements reach bus subscribers

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;

    use stockflow_core::{Deadline, DomainError, ExpectedVersion, OrderId, ProductId, WarehouseId};
    use stockflow_events::EventBus;
    use stockflow_inventory::{
        ConsumeFefo, ExpiryConfig, InventoryError, MovementQuery, MovementType, ReceiveBatch,
        ReceiveStock, ReserveStock, ShipStock, Stock, StockKey, TransferStock, Warehouse,
        WarehouseKind,
    };

    use crate::config::LedgerConfig;
    use crate::ledger::StockLedger;
    use crate::saga::{TransferSaga, TransferSagaState};
    use crate::services::InMemoryServices;
    use crate::store::{
        BatchStore, InMemoryMovementJournal, InMemoryStockStore, MovementJournal, StockStore, StoreError,
    };

    fn receive(wh: WarehouseId, product: ProductId, quantity: i64, at: DateTime<Utc>) -> ReceiveStock {
        ReceiveStock {
            warehouse_id: wh,
            product_id: product,
            sku: "SKU-IT".to_string(),
            quantity,
            document: None,
            notes: None,
            occurred_at: at,
        }
    }

    fn transfer(from: WarehouseId, to: WarehouseId, product: ProductId, quantity: i64) -> TransferStock {
        TransferStock {
            from_warehouse_id: from,
            to_warehouse_id: to,
            product_id: product,
            sku: "SKU-IT".to_string(),
            quantity,
            notes: None,
            deadline: None,
            occurred_at: Utc::now(),
        }
    }

    /// Stock store that refuses writes for one warehouse and can slow down
    /// writes for another.
    struct FlakyStockStore {
        inner: InMemoryStockStore,
        refuse: Option<WarehouseId>,
        slow: Option<(WarehouseId, StdDuration)>,
    }

    impl FlakyStockStore {
        fn new() -> Self {
            Self {
                inner: InMemoryStockStore::new(),
                refuse: None,
                slow: None,
            }
        }
    }

    impl StockStore for FlakyStockStore {
        fn get(&self, key: StockKey) -> Result<Option<Stock>, StoreError> {
            self.inner.get(key)
        }

        fn list_by_product(&self, product_id: ProductId) -> Result<Vec<Stock>, StoreError> {
            self.inner.list_by_product(product_id)
        }

        fn list_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>, StoreError> {
            self.inner.list_by_warehouse(warehouse_id)
        }

        fn save(&self, stock: Stock, expected: ExpectedVersion) -> Result<Stock, StoreError> {
            if self.refuse == Some(stock.warehouse_id) {
                return Err(StoreError::Unavailable("warehouse shard offline".to_string()));
            }
            if let Some((wh, delay)) = self.slow {
                if wh == stock.warehouse_id {
                    thread::sleep(delay);
                }
            }
            self.inner.save(stock, expected)
        }

        fn remove(&self, key: StockKey, expected: ExpectedVersion) -> Result<(), StoreError> {
            self.inner.remove(key, expected)
        }
    }

    #[test]
    fn concurrent_reservations_never_over_commit() {
        let services = InMemoryServices::new(LedgerConfig::default().with_max_write_retries(10_000));
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        let now = Utc::now();
        services.ledger.receive_stock(&receive(wh, product, 100, now)).unwrap();

        let workers = 20;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let manager = services.reservations.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    manager.reserve_stock(&ReserveStock {
                        order_id: OrderId::new(),
                        warehouse_id: wh,
                        product_id: product,
                        quantity: 10,
                        expires_at: now + Duration::minutes(15),
                        occurred_at: now,
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let granted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(granted, 10);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, InventoryError::InsufficientStock { .. }))
        );

        let stock = services.ledger.get_stock(wh, product).unwrap();
        assert_eq!(stock.reserved, 100);
        assert_eq!(stock.available, 0);
    }

    #[test]
    fn transfer_to_an_unwritable_destination_is_compensated() {
        let (from, to, product) = (WarehouseId::new(), WarehouseId::new(), ProductId::new());
        let mut stocks = FlakyStockStore::new();
        stocks.refuse = Some(to);
        let journal = Arc::new(InMemoryMovementJournal::new());
        let ledger = StockLedger::new(stocks, journal.clone());
        ledger.receive_stock(&receive(from, product, 20, Utc::now())).unwrap();

        let cmd = transfer(from, to, product, 8);
        let mut saga = TransferSaga::new(&ledger, &cmd);
        let err = saga.execute().unwrap_err();

        assert!(matches!(err, InventoryError::Storage(_)));
        assert!(matches!(saga.state(), TransferSagaState::Compensated { .. }));
        assert_eq!(ledger.get_stock(from, product).unwrap().quantity, 20);
        assert!(ledger.stocks().get(StockKey::new(to, product)).unwrap().is_none());
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn deadline_passing_mid_transfer_credits_the_source_back() {
        let (from, to, product) = (WarehouseId::new(), WarehouseId::new(), ProductId::new());
        let mut stocks = FlakyStockStore::new();
        stocks.slow = Some((from, StdDuration::from_millis(60)));
        let ledger = StockLedger::new(stocks, Arc::new(InMemoryMovementJournal::new()));
        ledger.receive_stock(&receive(from, product, 10, Utc::now())).unwrap();

        let mut cmd = transfer(from, to, product, 4);
        cmd.deadline = Some(Deadline::after(StdDuration::from_millis(20)));
        let mut saga = TransferSaga::new(&ledger, &cmd);
        let err = saga.execute().unwrap_err();

        assert_eq!(err, InventoryError::Domain(DomainError::DeadlineExceeded));
        assert!(matches!(saga.state(), TransferSagaState::Compensated { .. }));
        assert_eq!(ledger.get_stock(from, product).unwrap().quantity, 10);
        assert!(ledger.stocks().get(StockKey::new(to, product)).unwrap().is_none());
    }

    #[test]
    fn receive_then_ship_nets_to_zero_in_the_journal() {
        let services = InMemoryServices::new(LedgerConfig::default());
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        let now = Utc::now();
        services.ledger.receive_stock(&receive(wh, product, 10, now)).unwrap();
        let after = services
            .ledger
            .ship_stock(&ShipStock {
                warehouse_id: wh,
                product_id: product,
                quantity: 10,
                document: None,
                notes: None,
                occurred_at: now,
            })
            .unwrap();
        assert_eq!(after.quantity, 0);

        let net: i64 = services
            .journal
            .query(&MovementQuery::for_warehouse(wh))
            .unwrap()
            .iter()
            .map(|e| e.movement.signed_effect(wh))
            .sum();
        assert_eq!(net, 0);
    }

    #[test]
    fn reservation_lifecycle_publishes_the_order_shipment() {
        let services = InMemoryServices::new(LedgerConfig::default());
        let sub = services.bus.subscribe();
        let (wh, product, order) = (WarehouseId::new(), ProductId::new(), OrderId::new());
        let now = Utc::now();
        services.ledger.receive_stock(&receive(wh, product, 100, now)).unwrap();

        let reservation = services
            .reservations
            .reserve_stock(&ReserveStock {
                order_id: order,
                warehouse_id: wh,
                product_id: product,
                quantity: 30,
                expires_at: now + Duration::hours(1),
                occurred_at: now,
            })
            .unwrap();

        let ship_too_much = services.ledger.ship_stock(&ShipStock {
            warehouse_id: wh,
            product_id: product,
            quantity: 80,
            document: None,
            notes: None,
            occurred_at: now,
        });
        assert!(matches!(
            ship_too_much,
            Err(InventoryError::InsufficientStock { available: 70, .. })
        ));

        services.reservations.fulfill_reservation(reservation.id, now).unwrap();
        let stock = services.ledger.get_stock(wh, product).unwrap();
        assert_eq!((stock.quantity, stock.reserved, stock.available), (70, 0, 70));

        let published: Vec<_> = std::iter::from_fn(|| sub.try_recv().ok())
            .map(|env| env.payload().clone())
            .collect();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].movement_type, MovementType::Shipment);
        assert_eq!(
            published[1].document.as_ref().map(|d| d.id.clone()),
            Some(order.to_string())
        );
    }

    #[test]
    fn allocation_feeds_a_reservation_in_the_chosen_warehouse() {
        let services = InMemoryServices::new(LedgerConfig::default());
        let product = ProductId::new();
        let now = Utc::now();
        let main = services
            .planner
            .register_warehouse(Warehouse::new("MAIN", "Main", WarehouseKind::Main, 1, now))
            .unwrap();
        let backup = services
            .planner
            .register_warehouse(Warehouse::new("BK", "Backup", WarehouseKind::Store, 2, now))
            .unwrap();
        services.ledger.receive_stock(&receive(main.id, product, 5, now)).unwrap();
        services.ledger.receive_stock(&receive(backup.id, product, 50, now)).unwrap();

        let allocation = services.planner.allocate_stock(product, 20).unwrap();
        let chosen = allocation.warehouse_id.unwrap();
        assert_eq!(chosen, backup.id);

        services
            .reservations
            .reserve_stock(&ReserveStock {
                order_id: OrderId::new(),
                warehouse_id: chosen,
                product_id: product,
                quantity: 20,
                expires_at: now + Duration::hours(1),
                occurred_at: now,
            })
            .unwrap();
        assert_eq!(services.planner.get_total_available(product).unwrap(), 35);
    }

    #[test]
    fn batches_and_coarse_stock_stay_reconciled() {
        let config = LedgerConfig::default().with_expiry(ExpiryConfig::default().with_auto_write_off(true));
        let services = InMemoryServices::new(config);
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        let now = Utc::now();

        for (number, quantity, days) in [("A", 10, 2), ("B", 15, 20), ("C", 8, 200)] {
            services
                .batches
                .receive_batch(&ReceiveBatch {
                    warehouse_id: wh,
                    product_id: product,
                    sku: "SKU-IT".to_string(),
                    batch_number: number.to_string(),
                    lot_number: None,
                    quantity,
                    expiry_date: Some(now + Duration::days(days)),
                    cost_price: Decimal::new(199, 2),
                    location: None,
                    occurred_at: now,
                })
                .unwrap();
        }

        services
            .batches
            .consume_fefo(&ConsumeFefo {
                warehouse_id: wh,
                product_id: product,
                quantity: 12,
                document: None,
                occurred_at: now,
            })
            .unwrap();

        let written = services
            .batches
            .auto_write_off_expired(wh, now + Duration::days(25))
            .unwrap();
        assert_eq!(written.len(), 1);

        let remaining = services.batches.batches().list(wh, product).unwrap();
        let batch_total: i64 = remaining.iter().map(|b| b.quantity).sum();
        let stock = services.ledger.get_stock(wh, product).unwrap();
        assert_eq!(stock.quantity, 8);
        assert_eq!(batch_total, stock.quantity);
        assert_eq!(remaining.len(), 3);

        let dashboard = services.alerts.expiry_dashboard(wh, now).unwrap();
        assert_eq!(dashboard.pending_alerts, 2);
    }

    #[test]
    fn fefo_pick_spans_batches_and_caps_the_last() {
        let services = InMemoryServices::new(LedgerConfig::default());
        let (wh, product) = (WarehouseId::new(), ProductId::new());
        let now = Utc::now();
        for (number, days) in [("B", 41), ("A", 10)] {
            services
                .batches
                .receive_batch(&ReceiveBatch {
                    warehouse_id: wh,
                    product_id: product,
                    sku: "SKU-IT".to_string(),
                    batch_number: number.to_string(),
                    lot_number: None,
                    quantity: 10,
                    expiry_date: Some(now + Duration::days(days)),
                    cost_price: Decimal::ONE,
                    location: None,
                    occurred_at: now,
                })
                .unwrap();
        }

        let picks = services.batches.allocate_fefo(wh, product, 15, now).unwrap();
        let summary: Vec<_> = picks.iter().map(|p| (p.batch_number.as_str(), p.quantity)).collect();
        assert_eq!(summary, vec![("A", 10), ("B", 5)]);
    }
}
