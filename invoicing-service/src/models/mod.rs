//! Domain models for invoicing-service.

mod customer;
mod invoice;
mod task;

pub use customer::{CreateCustomer, Customer, NewCustomer};
pub use invoice::{
    due_date_for, invoice_number_for, Invoice, InvoiceAmounts, InvoiceStatus, NewInvoice,
    PAYMENT_TERMS_DAYS,
};
pub use task::{CreateTask, Task, TaskFilter, TaskStatus, TaskStatusUpdate};

/// Raised when a stored status column holds a value outside its enum.
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
