//! Customer model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A customer whose tasks are billed by the hour.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub hourly_rate: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a customer. A missing rate falls back to the configured default.
#[derive(Debug, Clone, Default)]
pub struct CreateCustomer {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub hourly_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Validated customer row handed to the store.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub hourly_rate: Decimal,
    pub notes: Option<String>,
}
