//! Configuration module for invoicing-service.

use rust_decimal::Decimal;
use service_core::config::{self as core_config, DatabaseConfig};
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

/// Hourly rate applied to customers created without one.
pub const DEFAULT_HOURLY_RATE: i64 = 349;

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub default_hourly_rate: Decimal,
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let default_hourly_rate = match env::var("DEFAULT_HOURLY_RATE") {
            Ok(raw) => Decimal::from_str(raw.trim()).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid DEFAULT_HOURLY_RATE: {}", e))
            })?,
            Err(_) => Decimal::from(DEFAULT_HOURLY_RATE),
        };
        if default_hourly_rate <= Decimal::ZERO {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_HOURLY_RATE must be greater than zero"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "invoicing-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig::from_env()?,
            default_hourly_rate,
        })
    }
}
