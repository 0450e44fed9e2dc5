//! Inventory transaction model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UnknownVariant;

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Restock,
    Usage,
    Adjustment,
    Waste,
}

impl TransactionType {
    /// Convert to proto enum value.
    pub fn to_proto(self) -> i32 {
        match self {
            Self::Restock => 1,
            Self::Usage => 2,
            Self::Adjustment => 3,
            Self::Waste => 4,
        }
    }

    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restock => "restock",
            Self::Usage => "usage",
            Self::Adjustment => "adjustment",
            Self::Waste => "waste",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for TransactionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "restock" => Ok(Self::Restock),
            "usage" => Ok(Self::Usage),
            "adjustment" => Ok(Self::Adjustment),
            "waste" => Ok(Self::Waste),
            _ => Err(UnknownVariant {
                kind: "transaction type",
                value,
            }),
        }
    }
}

/// Ledger row. Quantity is signed: positive adds stock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryTransaction {
    pub transaction_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub cost_total: Option<Decimal>,
    pub notes: Option<String>,
    pub employee_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// A stock change and the ledger row that records it.
#[derive(Debug, Clone)]
pub struct StockMovement {
    pub item_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub cost_total: Option<Decimal>,
    pub notes: Option<String>,
    pub employee_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
}

/// Filter parameters for listing transactions.
#[derive(Debug, Clone, Copy)]
pub struct TransactionFilter {
    pub item_id: Option<Uuid>,
    pub limit: i64,
}
