//! Stock ledger behaviour on the in-memory store.

mod common;

use async_trait::async_trait;
use common::{ledger, new_item, seed_item};
use inventory_service::models::{
    AlertType, CreateItem, InventoryAlert, InventoryItem, InventoryTransaction, ItemCategory,
    NewAlert, StockMovement, TransactionFilter, TransactionType,
};
use inventory_service::services::{InMemoryStore, InventoryError, InventoryStore, StockLedger};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory store whose alert writes always fail.
#[derive(Default)]
struct BrokenAlertStore {
    inner: InMemoryStore,
}

#[async_trait]
impl InventoryStore for BrokenAlertStore {
    async fn health_check(&self) -> Result<(), InventoryError> {
        self.inner.health_check().await
    }

    async fn create_item(&self, input: &CreateItem) -> Result<InventoryItem, InventoryError> {
        self.inner.create_item(input).await
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, InventoryError> {
        self.inner.get_item(item_id).await
    }

    async fn list_items(
        &self,
        category: Option<ItemCategory>,
    ) -> Result<Vec<InventoryItem>, InventoryError> {
        self.inner.list_items(category).await
    }

    async fn apply_movement(
        &self,
        movement: &StockMovement,
    ) -> Result<InventoryItem, InventoryError> {
        self.inner.apply_movement(movement).await
    }

    async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<InventoryTransaction>, InventoryError> {
        self.inner.list_transactions(filter).await
    }

    async fn transaction_sum(&self, item_id: Uuid) -> Result<Decimal, InventoryError> {
        self.inner.transaction_sum(item_id).await
    }

    async fn create_stock_alert(
        &self,
        _input: &NewAlert,
    ) -> Result<Option<InventoryAlert>, InventoryError> {
        Err(InventoryError::Persistence(anyhow::anyhow!(
            "inventory_alerts is unavailable"
        )))
    }

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<InventoryAlert>, InventoryError> {
        self.inner.get_alert(alert_id).await
    }

    async fn list_active_alerts(&self) -> Result<Vec<InventoryAlert>, InventoryError> {
        self.inner.list_active_alerts().await
    }

    async fn resolve_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<Option<InventoryAlert>, InventoryError> {
        self.inner.resolve_alert(alert_id).await
    }
}

#[tokio::test]
async fn usage_below_minimum_decrements_stock_and_raises_low_stock_alert() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(5), dec!(10)).await;

    let updated = ledger
        .record_usage(item.item_id, dec!(3), Some(Uuid::new_v4()), None, None)
        .await
        .unwrap();
    assert_eq!(updated.current_stock, dec!(2));

    let transactions = ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].transaction_type, TransactionType::Usage);
    assert_eq!(transactions[0].quantity, dec!(-3));
    assert_eq!(transactions[0].item_name, "Allrengöring");

    let alerts = ledger.list_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::LowStock);
    assert_eq!(alerts[0].current_value, dec!(2));
    assert_eq!(alerts[0].threshold_value, dec!(10));
    assert_eq!(alerts[0].unit, "bottles");
}

#[tokio::test]
async fn add_item_writes_no_transaction_and_no_alert() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(1), dec!(10)).await;

    assert_eq!(item.current_stock, dec!(1));
    assert_eq!(item.initial_stock, dec!(1));
    assert!(item.last_restocked_utc.is_none());
    assert!(ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap()
        .is_empty());
    assert!(ledger.list_active_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn usage_beyond_stock_is_rejected_without_side_effects() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(2), dec!(1)).await;

    let err = ledger
        .record_usage(item.item_id, dec!(3), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InsufficientStock { available } if available == dec!(2)));
    assert_eq!(err.to_string(), "Not enough in stock, available: 2");

    let reread = ledger.get_item(item.item_id).await.unwrap();
    assert_eq!(reread.current_stock, dec!(2));
    assert!(ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap()
        .is_empty());
    assert!(ledger.list_active_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_usage_never_drives_stock_negative() {
    let ledger = ledger();
    let item_id = seed_item(&ledger, dec!(5), dec!(10)).await.item_id;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .record_usage(item_id, dec!(1), None, None, None)
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(InventoryError::InsufficientStock { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(succeeded, 5);
    assert_eq!(rejected, 5);

    let check = ledger.verify_ledger(item_id).await.unwrap();
    assert_eq!(check.current_stock, dec!(0));
    assert_eq!(check.transaction_sum, dec!(-5));
    assert!(check.is_balanced());

    // Repeated checks below the minimum keep a single open alert.
    let alerts = ledger.list_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn ledger_sum_matches_stock_change_across_movement_types() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(8), dec!(2)).await;

    ledger
        .restock(item.item_id, dec!(12.5), Some(dec!(39.90)), None)
        .await
        .unwrap();
    ledger
        .record_usage(item.item_id, dec!(4.25), None, None, None)
        .await
        .unwrap();
    ledger
        .record_waste(item.item_id, dec!(1), Some("Läckande flaska".to_string()), None)
        .await
        .unwrap();
    ledger
        .adjust_stock(item.item_id, dec!(-0.25), Some("Inventering".to_string()))
        .await
        .unwrap();
    ledger
        .adjust_stock(item.item_id, dec!(2), None)
        .await
        .unwrap();

    let check = ledger.verify_ledger(item.item_id).await.unwrap();
    assert_eq!(check.initial_stock, dec!(8));
    assert_eq!(check.current_stock, dec!(17));
    assert_eq!(check.transaction_sum, dec!(9));
    assert!(check.is_balanced());

    let types: Vec<TransactionType> = ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap()
        .iter()
        .map(|t| t.transaction_type)
        .collect();
    assert_eq!(
        types,
        vec![
            TransactionType::Adjustment,
            TransactionType::Adjustment,
            TransactionType::Waste,
            TransactionType::Usage,
            TransactionType::Restock,
        ]
    );
}

#[tokio::test]
async fn restock_sets_cost_total_and_last_restocked() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(5), dec!(2)).await;

    let updated = ledger
        .restock(item.item_id, dec!(10), Some(dec!(12.50)), None)
        .await
        .unwrap();
    assert_eq!(updated.current_stock, dec!(15));
    assert!(updated.last_restocked_utc.is_some());

    let transactions = ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap();
    assert_eq!(transactions[0].quantity, dec!(10));
    assert_eq!(transactions[0].cost_total, Some(dec!(125)));

    ledger.restock(item.item_id, dec!(1), None, None).await.unwrap();
    let latest = ledger
        .list_transactions(Some(item.item_id), Some(1))
        .await
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].cost_total, None);
}

#[tokio::test]
async fn usage_down_to_zero_raises_out_of_stock() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(2), dec!(0)).await;

    ledger
        .record_usage(item.item_id, dec!(2), None, None, None)
        .await
        .unwrap();

    let alerts = ledger.list_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::OutOfStock);
    assert_eq!(alerts[0].current_value, dec!(0));
}

#[tokio::test]
async fn open_alert_blocks_duplicates_until_resolved() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(10), dec!(5)).await;

    ledger
        .record_usage(item.item_id, dec!(6), None, None, None)
        .await
        .unwrap();
    ledger
        .record_waste(item.item_id, dec!(4), None, None)
        .await
        .unwrap();

    let alerts = ledger.list_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::LowStock);
    assert_eq!(alerts[0].current_value, dec!(4));

    let resolved = ledger.resolve_alert(alerts[0].alert_id).await.unwrap();
    assert!(resolved.resolved);
    let resolved_at = resolved.resolved_utc.expect("resolved_utc is set");

    let again = ledger.resolve_alert(alerts[0].alert_id).await.unwrap();
    assert!(again.resolved);
    assert_eq!(again.resolved_utc, Some(resolved_at));
    assert!(ledger.list_active_alerts().await.unwrap().is_empty());

    // Stock is already at zero; the next removal has nothing left to take.
    ledger
        .restock(item.item_id, dec!(1), None, None)
        .await
        .unwrap();
    ledger
        .record_usage(item.item_id, dec!(1), None, None, None)
        .await
        .unwrap();

    let alerts = ledger.list_active_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::OutOfStock);
}

#[tokio::test]
async fn restock_and_positive_adjustment_do_not_raise_alerts() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(1), dec!(10)).await;

    ledger
        .restock(item.item_id, dec!(2), None, None)
        .await
        .unwrap();
    ledger
        .adjust_stock(item.item_id, dec!(1), None)
        .await
        .unwrap();
    assert!(ledger.list_active_alerts().await.unwrap().is_empty());

    ledger
        .adjust_stock(item.item_id, dec!(-1), None)
        .await
        .unwrap();
    assert_eq!(ledger.list_active_alerts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn adjustment_respects_stock_floor() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(3), dec!(0)).await;

    let err = ledger
        .adjust_stock(item.item_id, dec!(-4), None)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InsufficientStock { .. }));

    let err = ledger
        .adjust_stock(item.item_id, dec!(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Validation(_)));

    assert_eq!(ledger.get_item(item.item_id).await.unwrap().current_stock, dec!(3));
}

#[tokio::test]
async fn movement_validation_happens_before_the_store() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(3), dec!(0)).await;

    for quantity in [dec!(0), dec!(-1), dec!(0.0005)] {
        let err = ledger
            .record_usage(item.item_id, quantity, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)), "{}", quantity);
    }

    let err = ledger
        .restock(item.item_id, dec!(1), Some(dec!(-5)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Validation(_)));

    assert!(ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let ledger = ledger();

    let err = ledger
        .record_usage(Uuid::new_v4(), dec!(1), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::NotFound("Inventory item")));

    let err = ledger.verify_ledger(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, InventoryError::NotFound(_)));

    let err = ledger.resolve_alert(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, InventoryError::NotFound("Inventory alert")));
}

#[tokio::test]
async fn add_item_validates_input() {
    let ledger = ledger();

    let mut input = new_item("  ", dec!(1), dec!(0));
    assert!(matches!(
        ledger.add_item(input.clone()).await.unwrap_err(),
        InventoryError::Validation(_)
    ));

    input.name = "Mopp".to_string();
    input.minimum_stock = dec!(-1);
    assert!(matches!(
        ledger.add_item(input.clone()).await.unwrap_err(),
        InventoryError::Validation(_)
    ));

    input.minimum_stock = dec!(0);
    input.unit = String::new();
    assert!(matches!(
        ledger.add_item(input).await.unwrap_err(),
        InventoryError::Validation(_)
    ));

    assert!(ledger.list_items(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn items_listed_by_name_with_category_filter() {
    let ledger = ledger();
    ledger
        .add_item(new_item("Glasrengöring", dec!(4), dec!(1)))
        .await
        .unwrap();
    let mut vacuum = new_item("Dammsugare", dec!(2), dec!(1));
    vacuum.category = ItemCategory::Equipment;
    vacuum.unit = "st".to_string();
    ledger.add_item(vacuum).await.unwrap();
    ledger
        .add_item(new_item("Allrengöring", dec!(6), dec!(2)))
        .await
        .unwrap();

    let names: Vec<String> = ledger
        .list_items(None)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["Allrengöring", "Dammsugare", "Glasrengöring"]);

    let equipment = ledger
        .list_items(Some(ItemCategory::Equipment))
        .await
        .unwrap();
    assert_eq!(equipment.len(), 1);
    assert_eq!(equipment[0].name, "Dammsugare");
}

#[tokio::test]
async fn transactions_listed_newest_first_across_items() {
    let ledger = ledger();
    let soap = seed_item(&ledger, dec!(10), dec!(0)).await;
    let cloths = ledger
        .add_item(new_item("Mikrofiberduk", dec!(20), dec!(0)))
        .await
        .unwrap();

    ledger
        .record_usage(soap.item_id, dec!(1), None, None, None)
        .await
        .unwrap();
    ledger
        .record_usage(cloths.item_id, dec!(2), None, None, None)
        .await
        .unwrap();
    ledger
        .record_usage(soap.item_id, dec!(3), None, None, None)
        .await
        .unwrap();

    let all = ledger.list_transactions(None, None).await.unwrap();
    let quantities: Vec<_> = all.iter().map(|t| t.quantity).collect();
    assert_eq!(quantities, vec![dec!(-3), dec!(-2), dec!(-1)]);

    let limited = ledger.list_transactions(None, Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].quantity, dec!(-3));

    let soap_only = ledger
        .list_transactions(Some(soap.item_id), Some(0))
        .await
        .unwrap();
    assert_eq!(soap_only.len(), 2);
}

#[tokio::test]
async fn failed_alert_check_keeps_the_usage() {
    common::init_tracing();
    let ledger = StockLedger::new(Arc::new(BrokenAlertStore::default()));
    let item = seed_item(&ledger, dec!(5), dec!(10)).await;
    let task_id = Uuid::new_v4();

    let updated = ledger
        .record_usage(item.item_id, dec!(3), Some(task_id), None, None)
        .await
        .expect("usage must survive a failing alert check");
    assert_eq!(updated.current_stock, dec!(2));

    let transactions = ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].quantity, dec!(-3));
    assert_eq!(transactions[0].task_id, Some(task_id));

    ledger
        .record_waste(item.item_id, dec!(2), None, None)
        .await
        .expect("waste must survive a failing alert check");
    let check = ledger.verify_ledger(item.item_id).await.unwrap();
    assert_eq!(check.current_stock, dec!(0));
    assert!(check.is_balanced());
    assert!(ledger.list_active_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn restock_cost_rounds_half_away_from_zero() {
    let ledger = ledger();
    let item = seed_item(&ledger, dec!(1), dec!(0)).await;

    ledger
        .restock(item.item_id, dec!(0.5), Some(dec!(0.25)), None)
        .await
        .unwrap();

    let transactions = ledger
        .list_transactions(Some(item.item_id), None)
        .await
        .unwrap();
    assert_eq!(transactions[0].cost_total, Some(dec!(0.13)));
}
