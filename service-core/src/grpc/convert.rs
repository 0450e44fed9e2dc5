//! Wire conversions shared by the gRPC handlers.
//!
//! Decimals travel as strings, dates as `YYYY-MM-DD` and optional fields as
//! empty strings.

use chrono::{DateTime, NaiveDate, Utc};
use prost_types::Timestamp;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Format a Decimal as a normalized string.
pub fn format_decimal(d: &Decimal) -> String {
    let s = d.to_string();
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Convert DateTime to proto Timestamp.
pub fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

/// Treat empty or whitespace-only strings as absent.
pub fn optional_string(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn parse_uuid(value: &str, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {} format", field)))
}

pub fn parse_optional_uuid(value: &str, field: &str) -> Result<Option<Uuid>, AppError> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_uuid(value, field).map(Some)
}

pub fn parse_decimal(value: &str, field: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(value.trim())
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {} format", field)))
}

pub fn parse_optional_decimal(value: &str, field: &str) -> Result<Option<Decimal>, AppError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_decimal(value, field).map(Some)
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {} format", field)))
}
