use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{InvoiceStatus, TaskStatus};

#[derive(Error, Debug)]
pub enum InvoicingError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Task or customer not found")]
    TaskOrCustomerNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task {0} is not completed")]
    TaskNotCompleted(Uuid),

    #[error("Task {0} has already been invoiced")]
    AlreadyInvoiced(Uuid),

    #[error("Invalid invoice status transition from {from} to {to}")]
    InvalidInvoiceTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    #[error("Invalid task status transition from {from} to {to}")]
    InvalidTaskTransition { from: TaskStatus, to: TaskStatus },

    #[error("Paid invoices cannot be deleted")]
    InvoicePaid,

    #[error("Invoice number {0} is already taken")]
    DuplicateInvoiceNumber(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl From<sqlx::Error> for InvoicingError {
    fn from(err: sqlx::Error) -> Self {
        InvoicingError::Persistence(anyhow::Error::new(err))
    }
}

impl From<InvoicingError> for AppError {
    fn from(err: InvoicingError) -> Self {
        match err {
            InvoicingError::NotFound(_) | InvoicingError::TaskOrCustomerNotFound => {
                AppError::NotFound(anyhow::anyhow!(err.to_string()))
            }
            InvoicingError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            InvoicingError::TaskNotCompleted(_)
            | InvoicingError::InvalidInvoiceTransition { .. }
            | InvoicingError::InvalidTaskTransition { .. }
            | InvoicingError::InvoicePaid => {
                AppError::FailedPrecondition(anyhow::anyhow!(err.to_string()))
            }
            InvoicingError::AlreadyInvoiced(_) => {
                AppError::Conflict(anyhow::anyhow!(err.to_string()))
            }
            InvoicingError::DuplicateInvoiceNumber(_) => {
                AppError::Conflict(anyhow::anyhow!(err.to_string()))
            }
            InvoicingError::Persistence(e) => AppError::DatabaseError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_app_errors() {
        let app: AppError = InvoicingError::TaskOrCustomerNotFound.into();
        assert!(matches!(app, AppError::NotFound(_)));

        let app: AppError = InvoicingError::AlreadyInvoiced(Uuid::new_v4()).into();
        assert!(matches!(app, AppError::Conflict(_)));

        let app: AppError = InvoicingError::InvalidInvoiceTransition {
            from: InvoiceStatus::Paid,
            to: InvoiceStatus::Sent,
        }
        .into();
        assert!(matches!(app, AppError::FailedPrecondition(_)));
        assert!(app.to_string().contains("from paid to sent"));

        let app: AppError = InvoicingError::Validation("hourly_rate must be positive".into()).into();
        assert!(matches!(app, AppError::BadRequest(_)));

        let app: AppError = InvoicingError::Persistence(anyhow::anyhow!("pool closed")).into();
        assert!(matches!(app, AppError::DatabaseError(_)));
    }
}
