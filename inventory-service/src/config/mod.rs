use service_core::config::{self as core_config, DatabaseConfig};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            common: core_config::Config::load()?,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "inventory-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig::from_env()?,
        })
    }
}
