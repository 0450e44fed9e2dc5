//! In-memory store for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    CreateItem, InventoryAlert, InventoryItem, InventoryTransaction, ItemCategory, NewAlert,
    StockMovement, TransactionFilter, TransactionType,
};
use crate::services::error::InventoryError;
use crate::services::store::InventoryStore;

#[derive(Default)]
struct State {
    items: HashMap<Uuid, InventoryItem>,
    /// Append order, oldest first.
    transactions: Vec<InventoryTransaction>,
    alerts: Vec<InventoryAlert>,
}

/// Single-lock store; each call sees and leaves a consistent state.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), InventoryError> {
        Ok(())
    }

    async fn create_item(&self, input: &CreateItem) -> Result<InventoryItem, InventoryError> {
        let now = Utc::now();
        let item = InventoryItem {
            item_id: Uuid::new_v4(),
            name: input.name.clone(),
            category: input.category,
            current_stock: input.initial_stock,
            initial_stock: input.initial_stock,
            minimum_stock: input.minimum_stock,
            unit: input.unit.clone(),
            cost_per_unit: input.cost_per_unit,
            supplier: input.supplier.clone(),
            notes: input.notes.clone(),
            last_restocked_utc: None,
            created_utc: now,
            updated_utc: now,
        };
        self.state
            .lock()
            .await
            .items
            .insert(item.item_id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, InventoryError> {
        Ok(self.state.lock().await.items.get(&item_id).cloned())
    }

    async fn list_items(
        &self,
        category: Option<ItemCategory>,
    ) -> Result<Vec<InventoryItem>, InventoryError> {
        let state = self.state.lock().await;
        let mut items: Vec<InventoryItem> = state
            .items
            .values()
            .filter(|item| category.is_none_or(|c| item.category == c))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_utc.cmp(&b.created_utc)));
        Ok(items)
    }

    async fn apply_movement(
        &self,
        movement: &StockMovement,
    ) -> Result<InventoryItem, InventoryError> {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .get_mut(&movement.item_id)
            .ok_or(InventoryError::NotFound("Inventory item"))?;

        let new_stock = item.current_stock + movement.quantity;
        if new_stock < Decimal::ZERO {
            return Err(InventoryError::InsufficientStock {
                available: item.current_stock,
            });
        }

        let now = Utc::now();
        item.current_stock = new_stock;
        item.updated_utc = now;
        if movement.transaction_type == TransactionType::Restock {
            item.last_restocked_utc = Some(now);
        }
        let item = item.clone();

        state.transactions.push(InventoryTransaction {
            transaction_id: Uuid::new_v4(),
            item_id: item.item_id,
            item_name: item.name.clone(),
            transaction_type: movement.transaction_type,
            quantity: movement.quantity,
            cost_total: movement.cost_total,
            notes: movement.notes.clone(),
            employee_id: movement.employee_id,
            task_id: movement.task_id,
            created_utc: now,
        });
        Ok(item)
    }

    async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<InventoryTransaction>, InventoryError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| filter.item_id.is_none_or(|id| t.item_id == id))
            .take(usize::try_from(filter.limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn transaction_sum(&self, item_id: Uuid) -> Result<Decimal, InventoryError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.item_id == item_id)
            .map(|t| t.quantity)
            .sum())
    }

    async fn create_stock_alert(
        &self,
        input: &NewAlert,
    ) -> Result<Option<InventoryAlert>, InventoryError> {
        let mut state = self.state.lock().await;
        let open = state
            .alerts
            .iter()
            .any(|a| a.item_id == input.item_id && !a.resolved && a.alert_type.is_stock_level());
        if open {
            return Ok(None);
        }

        let item = state
            .items
            .get(&input.item_id)
            .ok_or(InventoryError::NotFound("Inventory item"))?;
        let alert = InventoryAlert {
            alert_id: Uuid::new_v4(),
            item_id: item.item_id,
            item_name: item.name.clone(),
            unit: item.unit.clone(),
            alert_type: input.alert_type,
            threshold_value: input.threshold_value,
            current_value: input.current_value,
            resolved: false,
            created_utc: Utc::now(),
            resolved_utc: None,
        };
        state.alerts.push(alert.clone());
        Ok(Some(alert))
    }

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<InventoryAlert>, InventoryError> {
        let state = self.state.lock().await;
        Ok(state.alerts.iter().find(|a| a.alert_id == alert_id).cloned())
    }

    async fn list_active_alerts(&self) -> Result<Vec<InventoryAlert>, InventoryError> {
        let state = self.state.lock().await;
        Ok(state
            .alerts
            .iter()
            .rev()
            .filter(|a| !a.resolved)
            .cloned()
            .collect())
    }

    async fn resolve_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<Option<InventoryAlert>, InventoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .alerts
            .iter_mut()
            .find(|a| a.alert_id == alert_id)
            .map(|alert| {
                if !alert.resolved {
                    alert.resolved = true;
                    alert.resolved_utc = Some(Utc::now());
                }
                alert.clone()
            }))
    }
}
