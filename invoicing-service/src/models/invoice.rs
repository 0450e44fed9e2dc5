//! Invoice model for invoicing-service.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::UnknownVariant;

/// Days between issue and due date.
pub const PAYMENT_TERMS_DAYS: i64 = 14;

/// VAT share of a VAT-inclusive total (20%).
const VAT_SHARE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            _ => None,
        }
    }

    /// Statuses reachable in one step. Paid is terminal.
    pub fn allowed_transitions(&self) -> &'static [InvoiceStatus] {
        match self {
            InvoiceStatus::Draft => &[InvoiceStatus::Sent, InvoiceStatus::Paid],
            InvoiceStatus::Sent => &[InvoiceStatus::Paid, InvoiceStatus::Overdue],
            InvoiceStatus::Overdue => &[InvoiceStatus::Paid],
            InvoiceStatus::Paid => &[],
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        InvoiceStatus::from_string(&value).ok_or(UnknownVariant {
            kind: "invoice status",
            value,
        })
    }
}

/// Invoice generated from a completed task. Customer details and amounts are
/// snapshots taken at creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub task_id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_address: String,
    pub task_date: NaiveDate,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub total_amount: Decimal,
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub issued_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Billed amounts for an invoice. The total is VAT inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceAmounts {
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub total: Decimal,
    pub net: Decimal,
    pub vat: Decimal,
}

impl InvoiceAmounts {
    /// `total = hours * rate`, split into 80% net and 20% VAT. Net absorbs the
    /// rounding so the parts always add up to the total.
    pub fn compute(hours: Decimal, hourly_rate: Decimal) -> Self {
        let total =
            (hours * hourly_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let vat =
            (total * VAT_SHARE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            hours,
            hourly_rate,
            total,
            net: total - vat,
            vat,
        }
    }
}

/// Invoice number `F-YYYYMMDD-NNNN`.
pub fn invoice_number_for(issued: NaiveDate, suffix: u16) -> String {
    format!("F-{}-{:04}", issued.format("%Y%m%d"), suffix % 10_000)
}

pub fn due_date_for(issued: NaiveDate) -> NaiveDate {
    issued + Duration::days(PAYMENT_TERMS_DAYS)
}

/// Invoice row handed to the store.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub task_id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_address: String,
    pub task_date: NaiveDate,
    pub amounts: InvoiceAmounts,
    pub issued_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}
