//! Storage seam for invoicing-service.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    CreateTask, Customer, Invoice, InvoiceStatus, NewCustomer, NewInvoice, Task, TaskFilter,
    TaskStatus, TaskStatusUpdate,
};
use crate::services::error::InvoicingError;

/// Record store for customers, tasks and invoices.
///
/// Conditional operations return `Ok(None)` when their guard no longer holds
/// so the caller can re-read and report the precise reason.
#[async_trait]
pub trait InvoicingStore: Send + Sync {
    async fn health_check(&self) -> Result<(), InvoicingError>;

    async fn create_customer(&self, input: &NewCustomer) -> Result<Customer, InvoicingError>;

    async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, InvoicingError>;

    /// Customers ordered by name.
    async fn list_customers(&self) -> Result<Vec<Customer>, InvoicingError>;

    async fn update_customer_rate(
        &self,
        customer_id: Uuid,
        hourly_rate: Decimal,
    ) -> Result<Option<Customer>, InvoicingError>;

    async fn create_task(&self, input: &CreateTask) -> Result<Task, InvoicingError>;

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, InvoicingError>;

    /// Tasks ordered by scheduled date and start time, latest first.
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, InvoicingError>;

    /// Apply `update` only while the task is still in `from`.
    async fn update_task_status(
        &self,
        task_id: Uuid,
        from: TaskStatus,
        update: &TaskStatusUpdate,
    ) -> Result<Option<Task>, InvoicingError>;

    /// Insert the invoice and flag its task in one unit.
    ///
    /// Fails with `AlreadyInvoiced` when the task flag is already set and with
    /// `DuplicateInvoiceNumber` when the number is taken; neither leaves a trace.
    async fn insert_invoice_for_task(&self, input: &NewInvoice) -> Result<Invoice, InvoicingError>;

    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError>;

    /// Invoices newest first.
    async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, InvoicingError>;

    /// Compare-and-set on the invoice status.
    async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<Option<Invoice>, InvoicingError>;

    /// Delete an unpaid invoice and clear its task's invoiced flag in one unit.
    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError>;
}
