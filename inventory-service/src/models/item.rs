//! Inventory item model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{AlertType, UnknownVariant};

/// Item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    CleaningSupplies,
    Equipment,
    Consumables,
    Other,
}

impl ItemCategory {
    /// Convert from proto enum value.
    pub fn from_proto(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::CleaningSupplies),
            2 => Some(Self::Equipment),
            3 => Some(Self::Consumables),
            4 => Some(Self::Other),
            _ => None,
        }
    }

    /// Convert to proto enum value.
    pub fn to_proto(self) -> i32 {
        match self {
            Self::CleaningSupplies => 1,
            Self::Equipment => 2,
            Self::Consumables => 3,
            Self::Other => 4,
        }
    }

    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CleaningSupplies => "cleaning_supplies",
            Self::Equipment => "equipment",
            Self::Consumables => "consumables",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for ItemCategory {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "cleaning_supplies" => Ok(Self::CleaningSupplies),
            "equipment" => Ok(Self::Equipment),
            "consumables" => Ok(Self::Consumables),
            "other" => Ok(Self::Other),
            _ => Err(UnknownVariant {
                kind: "item category",
                value,
            }),
        }
    }
}

/// A stocked item. `initial_stock` is the baseline the ledger is measured against.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub item_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub category: ItemCategory,
    pub current_stock: Decimal,
    pub initial_stock: Decimal,
    pub minimum_stock: Decimal,
    pub unit: String,
    pub cost_per_unit: Decimal,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub last_restocked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl InventoryItem {
    /// The stock alert the current level calls for, if any.
    pub fn stock_alert(&self) -> Option<AlertType> {
        if self.current_stock > self.minimum_stock {
            None
        } else if self.current_stock.is_zero() {
            Some(AlertType::OutOfStock)
        } else {
            Some(AlertType::LowStock)
        }
    }
}

/// Input for adding an item.
#[derive(Debug, Clone)]
pub struct CreateItem {
    pub name: String,
    pub category: ItemCategory,
    pub initial_stock: Decimal,
    pub minimum_stock: Decimal,
    pub unit: String,
    pub cost_per_unit: Decimal,
    pub supplier: Option<String>,
    pub notes: Option<String>,
}

/// Result of reconciling an item's stock with its transaction ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCheck {
    pub item_id: Uuid,
    pub initial_stock: Decimal,
    pub current_stock: Decimal,
    pub transaction_sum: Decimal,
}

impl LedgerCheck {
    pub fn is_balanced(&self) -> bool {
        self.current_stock - self.initial_stock == self.transaction_sum
    }
}
