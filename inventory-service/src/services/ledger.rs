//! Stock ledger operations.
//!
//! Every stock change goes through the store as a single movement that both
//! updates the level and appends the signed ledger row. Removals are followed
//! by a best-effort low-stock check.

use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    CreateItem, InventoryAlert, InventoryItem, InventoryTransaction, ItemCategory, LedgerCheck,
    NewAlert, StockMovement, TransactionFilter, TransactionType,
};
use crate::services::error::InventoryError;
use crate::services::metrics::{ALERTS_RAISED_TOTAL, STOCK_MOVEMENTS_TOTAL};
use crate::services::store::InventoryStore;

pub const DEFAULT_TRANSACTION_LIMIT: i64 = 50;
pub const MAX_TRANSACTION_LIMIT: i64 = 200;

/// Stock quantities carry at most three decimals.
const QUANTITY_SCALE: u32 = 3;
const MONEY_SCALE: u32 = 2;

pub struct StockLedger {
    store: Arc<dyn InventoryStore>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    /// Adds an item. The initial stock is the ledger baseline, so no
    /// transaction is written.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add_item(&self, input: CreateItem) -> Result<InventoryItem, InventoryError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(InventoryError::Validation("name is required".into()));
        }
        let unit = input.unit.trim().to_string();
        if unit.is_empty() {
            return Err(InventoryError::Validation("unit is required".into()));
        }
        ensure_quantity(input.initial_stock, "initial_stock", false)?;
        ensure_quantity(input.minimum_stock, "minimum_stock", false)?;
        ensure_cost(input.cost_per_unit, "cost_per_unit")?;

        let item = self
            .store
            .create_item(&CreateItem { name, unit, ..input })
            .await?;
        info!(item_id = %item.item_id, initial_stock = %item.initial_stock, "Inventory item added");
        Ok(item)
    }

    pub async fn get_item(&self, item_id: Uuid) -> Result<InventoryItem, InventoryError> {
        self.store
            .get_item(item_id)
            .await?
            .ok_or(InventoryError::NotFound("Inventory item"))
    }

    pub async fn list_items(
        &self,
        category: Option<ItemCategory>,
    ) -> Result<Vec<InventoryItem>, InventoryError> {
        self.store.list_items(category).await
    }

    // -------------------------------------------------------------------------
    // Movements
    // -------------------------------------------------------------------------

    #[instrument(skip(self, notes), fields(item_id = %item_id, quantity = %quantity))]
    pub async fn restock(
        &self,
        item_id: Uuid,
        quantity: Decimal,
        cost_per_unit: Option<Decimal>,
        notes: Option<String>,
    ) -> Result<InventoryItem, InventoryError> {
        ensure_quantity(quantity, "quantity", true)?;
        if let Some(cost) = cost_per_unit {
            ensure_cost(cost, "cost_per_unit")?;
        }

        self.apply(StockMovement {
            item_id,
            transaction_type: TransactionType::Restock,
            quantity,
            cost_total: cost_per_unit.map(|cost| {
                (cost * quantity)
                    .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
            }),
            notes,
            employee_id: None,
            task_id: None,
        })
        .await
    }

    /// Consumes stock for a task. Fails without side effects when the stock
    /// would go negative.
    #[instrument(skip(self, notes), fields(item_id = %item_id, quantity = %quantity))]
    pub async fn record_usage(
        &self,
        item_id: Uuid,
        quantity: Decimal,
        task_id: Option<Uuid>,
        notes: Option<String>,
        employee_id: Option<Uuid>,
    ) -> Result<InventoryItem, InventoryError> {
        ensure_quantity(quantity, "quantity", true)?;

        let item = self
            .apply(StockMovement {
                item_id,
                transaction_type: TransactionType::Usage,
                quantity: -quantity,
                cost_total: None,
                notes,
                employee_id,
                task_id,
            })
            .await?;
        self.check_stock_alert(&item).await;
        Ok(item)
    }

    #[instrument(skip(self, notes), fields(item_id = %item_id, quantity = %quantity))]
    pub async fn record_waste(
        &self,
        item_id: Uuid,
        quantity: Decimal,
        notes: Option<String>,
        employee_id: Option<Uuid>,
    ) -> Result<InventoryItem, InventoryError> {
        ensure_quantity(quantity, "quantity", true)?;

        let item = self
            .apply(StockMovement {
                item_id,
                transaction_type: TransactionType::Waste,
                quantity: -quantity,
                cost_total: None,
                notes,
                employee_id,
                task_id: None,
            })
            .await?;
        self.check_stock_alert(&item).await;
        Ok(item)
    }

    /// Stock-count correction by a signed, non-zero delta.
    #[instrument(skip(self, notes), fields(item_id = %item_id, delta = %delta))]
    pub async fn adjust_stock(
        &self,
        item_id: Uuid,
        delta: Decimal,
        notes: Option<String>,
    ) -> Result<InventoryItem, InventoryError> {
        if delta.is_zero() {
            return Err(InventoryError::Validation("delta must not be zero".into()));
        }
        ensure_quantity(delta.abs(), "delta", true)?;

        let item = self
            .apply(StockMovement {
                item_id,
                transaction_type: TransactionType::Adjustment,
                quantity: delta,
                cost_total: None,
                notes,
                employee_id: None,
                task_id: None,
            })
            .await?;
        if delta.is_sign_negative() {
            self.check_stock_alert(&item).await;
        }
        Ok(item)
    }

    async fn apply(&self, movement: StockMovement) -> Result<InventoryItem, InventoryError> {
        match self.store.apply_movement(&movement).await {
            Ok(item) => {
                STOCK_MOVEMENTS_TOTAL
                    .with_label_values(&[movement.transaction_type.as_str()])
                    .inc();
                Ok(item)
            }
            Err(e) => {
                if let InventoryError::InsufficientStock { available } = &e {
                    warn!(
                        item_id = %movement.item_id,
                        requested = %movement.quantity.abs(),
                        available = %available,
                        "Rejected stock movement"
                    );
                }
                Err(e)
            }
        }
    }

    /// Opens a stock alert when the level is at or below the minimum and none
    /// is open. Failures are logged and swallowed.
    async fn check_stock_alert(&self, item: &InventoryItem) -> Option<InventoryAlert> {
        let alert_type = item.stock_alert()?;
        let input = NewAlert {
            item_id: item.item_id,
            alert_type,
            threshold_value: item.minimum_stock,
            current_value: item.current_stock,
        };
        match self.store.create_stock_alert(&input).await {
            Ok(Some(alert)) => {
                ALERTS_RAISED_TOTAL
                    .with_label_values(&[alert_type.as_str()])
                    .inc();
                info!(
                    alert_id = %alert.alert_id,
                    item_id = %item.item_id,
                    alert_type = %alert_type,
                    "Stock alert raised"
                );
                Some(alert)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(item_id = %item.item_id, error = %e, "Stock alert check failed");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Ledger queries
    // -------------------------------------------------------------------------

    /// Newest first. `limit` defaults to 50 and is capped at 200.
    pub async fn list_transactions(
        &self,
        item_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<InventoryTransaction>, InventoryError> {
        let limit = match limit {
            Some(limit) if limit > 0 => limit.min(MAX_TRANSACTION_LIMIT),
            _ => DEFAULT_TRANSACTION_LIMIT,
        };
        self.store
            .list_transactions(TransactionFilter { item_id, limit })
            .await
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn verify_ledger(&self, item_id: Uuid) -> Result<LedgerCheck, InventoryError> {
        let item = self.get_item(item_id).await?;
        let transaction_sum = self.store.transaction_sum(item_id).await?;
        let check = LedgerCheck {
            item_id,
            initial_stock: item.initial_stock,
            current_stock: item.current_stock,
            transaction_sum,
        };
        if !check.is_balanced() {
            warn!(
                item_id = %item_id,
                current_stock = %check.current_stock,
                initial_stock = %check.initial_stock,
                transaction_sum = %check.transaction_sum,
                "Inventory ledger out of balance"
            );
        }
        Ok(check)
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    pub async fn list_active_alerts(&self) -> Result<Vec<InventoryAlert>, InventoryError> {
        self.store.list_active_alerts().await
    }

    /// Manual resolution; the stock level is not re-checked.
    #[instrument(skip(self), fields(alert_id = %alert_id))]
    pub async fn resolve_alert(&self, alert_id: Uuid) -> Result<InventoryAlert, InventoryError> {
        self.store
            .resolve_alert(alert_id)
            .await?
            .ok_or(InventoryError::NotFound("Inventory alert"))
    }
}

fn ensure_quantity(value: Decimal, field: &str, positive: bool) -> Result<(), InventoryError> {
    if positive && value <= Decimal::ZERO {
        return Err(InventoryError::Validation(format!("{} must be positive", field)));
    }
    if value.is_sign_negative() && !value.is_zero() {
        return Err(InventoryError::Validation(format!("{} must not be negative", field)));
    }
    if value.normalize().scale() > QUANTITY_SCALE {
        return Err(InventoryError::Validation(format!(
            "{} allows at most {} decimals",
            field, QUANTITY_SCALE
        )));
    }
    Ok(())
}

fn ensure_cost(value: Decimal, field: &str) -> Result<(), InventoryError> {
    if value < Decimal::ZERO {
        return Err(InventoryError::Validation(format!("{} must not be negative", field)));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(InventoryError::Validation(format!(
            "{} allows at most {} decimals",
            field, MONEY_SCALE
        )));
    }
    Ok(())
}
