//! Domain models for inventory-service.

mod alert;
mod item;
mod transaction;

pub use alert::{AlertType, InventoryAlert, NewAlert};
pub use item::{CreateItem, InventoryItem, ItemCategory, LedgerCheck};
pub use transaction::{InventoryTransaction, StockMovement, TransactionFilter, TransactionType};

/// Raised when a stored enum column holds a value outside its enum.
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
