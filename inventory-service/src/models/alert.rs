//! Inventory alert model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UnknownVariant;

/// Alert type. Expiry alerts are stored and listed but never raised automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
    ExpiringSoon,
}

impl AlertType {
    /// Convert to proto enum value.
    pub fn to_proto(self) -> i32 {
        match self {
            Self::LowStock => 1,
            Self::OutOfStock => 2,
            Self::ExpiringSoon => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
            Self::ExpiringSoon => "expiring_soon",
        }
    }

    /// Low and out-of-stock alerts share the one-open-alert-per-item rule.
    pub fn is_stock_level(&self) -> bool {
        matches!(self, Self::LowStock | Self::OutOfStock)
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for AlertType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "low_stock" => Ok(Self::LowStock),
            "out_of_stock" => Ok(Self::OutOfStock),
            "expiring_soon" => Ok(Self::ExpiringSoon),
            _ => Err(UnknownVariant {
                kind: "alert type",
                value,
            }),
        }
    }
}

/// Alert joined with the item's name and unit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryAlert {
    pub alert_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit: String,
    #[sqlx(try_from = "String")]
    pub alert_type: AlertType,
    pub threshold_value: Decimal,
    pub current_value: Decimal,
    pub resolved: bool,
    pub created_utc: DateTime<Utc>,
    pub resolved_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub item_id: Uuid,
    pub alert_type: AlertType,
    pub threshold_value: Decimal,
    pub current_value: Decimal,
}
