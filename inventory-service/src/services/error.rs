use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not enough in stock, available: {}", .available.normalize())]
    InsufficientStock { available: Decimal },

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl From<sqlx::Error> for InventoryError {
    fn from(err: sqlx::Error) -> Self {
        InventoryError::Persistence(anyhow::Error::new(err))
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(err.to_string())),
            InventoryError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            InventoryError::InsufficientStock { .. } => {
                AppError::FailedPrecondition(anyhow::anyhow!(err.to_string()))
            }
            InventoryError::Persistence(e) => AppError::DatabaseError(e),
        }
    }
}
