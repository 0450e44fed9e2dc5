//! Storage seam for inventory-service.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    CreateItem, InventoryAlert, InventoryItem, InventoryTransaction, ItemCategory, NewAlert,
    StockMovement, TransactionFilter,
};
use crate::services::error::InventoryError;

/// Record store for items, their transaction ledger and alerts.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn health_check(&self) -> Result<(), InventoryError>;

    /// Insert an item with current stock equal to its initial stock.
    async fn create_item(&self, input: &CreateItem) -> Result<InventoryItem, InventoryError>;

    async fn get_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, InventoryError>;

    /// Items ordered by name.
    async fn list_items(
        &self,
        category: Option<ItemCategory>,
    ) -> Result<Vec<InventoryItem>, InventoryError>;

    /// Change the stock level and append the ledger row in one unit.
    ///
    /// The floor check and the write happen together; a movement that would
    /// take stock below zero fails with `InsufficientStock` and changes nothing.
    async fn apply_movement(
        &self,
        movement: &StockMovement,
    ) -> Result<InventoryItem, InventoryError>;

    /// Transactions newest first.
    async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<InventoryTransaction>, InventoryError>;

    /// Sum of all signed ledger quantities for an item.
    async fn transaction_sum(&self, item_id: Uuid) -> Result<Decimal, InventoryError>;

    /// Open a stock alert unless the item already has an unresolved one.
    async fn create_stock_alert(
        &self,
        input: &NewAlert,
    ) -> Result<Option<InventoryAlert>, InventoryError>;

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<InventoryAlert>, InventoryError>;

    /// Unresolved alerts newest first.
    async fn list_active_alerts(&self) -> Result<Vec<InventoryAlert>, InventoryError>;

    /// Mark an alert resolved. Already resolved alerts come back unchanged.
    async fn resolve_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<Option<InventoryAlert>, InventoryError>;
}
