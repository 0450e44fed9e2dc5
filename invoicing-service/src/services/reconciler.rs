//! Task-to-invoice reconciliation.
//!
//! Completed tasks become draft invoices with frozen amounts; each task is
//! invoiced at most once and deleting an unpaid invoice reopens its task.

use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    due_date_for, invoice_number_for, CreateCustomer, CreateTask, Customer, Invoice,
    InvoiceAmounts, InvoiceStatus, NewCustomer, NewInvoice, Task, TaskFilter, TaskStatus,
    TaskStatusUpdate,
};
use crate::services::error::InvoicingError;
use crate::services::metrics::{INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL, TASK_STATUS_CHANGES_TOTAL};
use crate::services::store::InvoicingStore;

/// Attempts at drawing an unused invoice number before giving up.
const INVOICE_NUMBER_ATTEMPTS: usize = 5;

/// Hours and money are stored with two decimals.
const AMOUNT_SCALE: u32 = 2;
/// Exclusive upper bounds; keep `hours × rate` inside the invoice total column.
const MAX_HOURS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
const MAX_HOURLY_RATE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

pub struct InvoiceReconciler {
    store: Arc<dyn InvoicingStore>,
    default_hourly_rate: Decimal,
}

impl InvoiceReconciler {
    pub fn new(store: Arc<dyn InvoicingStore>, default_hourly_rate: Decimal) -> Self {
        Self {
            store,
            default_hourly_rate,
        }
    }

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_customer(&self, input: CreateCustomer) -> Result<Customer, InvoicingError> {
        if input.name.trim().is_empty() {
            return Err(InvoicingError::Validation("name is required".into()));
        }
        if input.address.trim().is_empty() {
            return Err(InvoicingError::Validation("address is required".into()));
        }
        let hourly_rate = input.hourly_rate.unwrap_or(self.default_hourly_rate);
        ensure_hourly_rate(hourly_rate)?;

        self.store
            .create_customer(&NewCustomer {
                name: input.name.trim().to_string(),
                address: input.address.trim().to_string(),
                phone: input.phone,
                email: input.email,
                hourly_rate,
                notes: input.notes,
            })
            .await
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Customer, InvoicingError> {
        self.store
            .get_customer(customer_id)
            .await?
            .ok_or(InvoicingError::NotFound("Customer"))
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, InvoicingError> {
        self.store.list_customers().await
    }

    /// Changes the live rate only; issued invoices keep their snapshot.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn update_customer_rate(
        &self,
        customer_id: Uuid,
        hourly_rate: Decimal,
    ) -> Result<Customer, InvoicingError> {
        ensure_hourly_rate(hourly_rate)?;
        let customer = self
            .store
            .update_customer_rate(customer_id, hourly_rate)
            .await?
            .ok_or(InvoicingError::NotFound("Customer"))?;
        info!(customer_id = %customer_id, hourly_rate = %hourly_rate, "Customer rate updated");
        Ok(customer)
    }

    // -------------------------------------------------------------------------
    // Tasks
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_task(&self, input: CreateTask) -> Result<Task, InvoicingError> {
        ensure_hours(input.estimated_duration_hours, "estimated_duration_hours")?;
        if self.store.get_customer(input.customer_id).await?.is_none() {
            return Err(InvoicingError::NotFound("Customer"));
        }
        self.store.create_task(&input).await
    }

    pub async fn get_task(&self, task_id: Uuid) -> Result<Task, InvoicingError> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or(InvoicingError::NotFound("Task"))
    }

    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>, InvoicingError> {
        self.store
            .list_tasks(TaskFilter {
                status,
                invoice_generated: None,
            })
            .await
    }

    /// Completed tasks without an invoice, latest scheduled date first.
    pub async fn list_invoiceable_tasks(&self) -> Result<Vec<Task>, InvoicingError> {
        self.store.list_tasks(TaskFilter::invoiceable()).await
    }

    /// Moves a task along its lifecycle. An actual duration is only accepted
    /// when completing.
    #[instrument(skip(self), fields(task_id = %task_id, to = %status))]
    pub async fn update_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        actual_duration_hours: Option<Decimal>,
    ) -> Result<Task, InvoicingError> {
        if let Some(hours) = actual_duration_hours {
            if status != TaskStatus::Completed {
                return Err(InvoicingError::Validation(
                    "actual_duration_hours can only be set when completing a task".into(),
                ));
            }
            ensure_hours(hours, "actual_duration_hours")?;
        }

        let task = self.get_task(task_id).await?;
        if !task.status.can_transition_to(status) {
            warn!(from = %task.status, to = %status, "Rejected task status transition");
            return Err(InvoicingError::InvalidTaskTransition {
                from: task.status,
                to: status,
            });
        }

        let update = TaskStatusUpdate {
            status,
            actual_duration_hours,
            completed_utc: (status == TaskStatus::Completed).then(Utc::now),
        };
        match self
            .store
            .update_task_status(task_id, task.status, &update)
            .await?
        {
            Some(updated) => {
                TASK_STATUS_CHANGES_TOTAL
                    .with_label_values(&[status.as_str()])
                    .inc();
                Ok(updated)
            }
            None => {
                let current = self.get_task(task_id).await?;
                Err(InvoicingError::InvalidTaskTransition {
                    from: current.status,
                    to: status,
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    /// Creates a draft invoice for a completed, not yet invoiced task.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn create_invoice_from_task(&self, task_id: Uuid) -> Result<Invoice, InvoicingError> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(InvoicingError::TaskOrCustomerNotFound)?;
        let customer = self
            .store
            .get_customer(task.customer_id)
            .await?
            .ok_or(InvoicingError::TaskOrCustomerNotFound)?;

        if task.status != TaskStatus::Completed {
            warn!(status = %task.status, "Refusing to invoice task that is not completed");
            return Err(InvoicingError::TaskNotCompleted(task_id));
        }
        if task.invoice_generated {
            warn!("Refusing to invoice task twice");
            return Err(InvoicingError::AlreadyInvoiced(task_id));
        }

        let amounts = InvoiceAmounts::compute(task.billable_hours(), customer.hourly_rate);
        let issued_date = Utc::now().date_naive();

        for attempt in 1..=INVOICE_NUMBER_ATTEMPTS {
            let suffix = rand::thread_rng().gen_range(0..10_000u16);
            let new_invoice = NewInvoice {
                invoice_number: invoice_number_for(issued_date, suffix),
                task_id,
                customer_id: customer.customer_id,
                customer_name: customer.name.clone(),
                customer_address: customer.address.clone(),
                task_date: task.scheduled_date,
                amounts,
                issued_date,
                due_date: due_date_for(issued_date),
                notes: task.notes.clone(),
            };

            match self.store.insert_invoice_for_task(&new_invoice).await {
                Ok(invoice) => {
                    INVOICES_TOTAL
                        .with_label_values(&[InvoiceStatus::Draft.as_str()])
                        .inc();
                    INVOICE_AMOUNT_TOTAL.inc_by(invoice.total_amount.to_f64().unwrap_or(0.0));
                    info!(
                        invoice_id = %invoice.invoice_id,
                        invoice_number = %invoice.invoice_number,
                        total = %invoice.total_amount,
                        "Invoice created from task"
                    );
                    return Ok(invoice);
                }
                Err(InvoicingError::DuplicateInvoiceNumber(number)) => {
                    warn!(attempt, invoice_number = %number, "Invoice number collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(InvoicingError::Persistence(anyhow::anyhow!(
            "Could not allocate a unique invoice number for {}",
            issued_date
        )))
    }

    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Invoice, InvoicingError> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .ok_or(InvoicingError::NotFound("Invoice"))
    }

    pub async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        self.store.list_invoices(status).await
    }

    /// Applies one step of the invoice state machine. Paying stamps today's date.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, to = %status))]
    pub async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice, InvoicingError> {
        let invoice = self.get_invoice(invoice_id).await?;
        if !invoice.status.can_transition_to(status) {
            warn!(from = %invoice.status, to = %status, "Rejected invoice status transition");
            return Err(InvoicingError::InvalidInvoiceTransition {
                from: invoice.status,
                to: status,
            });
        }

        let paid_date = (status == InvoiceStatus::Paid).then(|| Utc::now().date_naive());
        match self
            .store
            .update_invoice_status(invoice_id, invoice.status, status, paid_date)
            .await?
        {
            Some(updated) => {
                INVOICES_TOTAL.with_label_values(&[status.as_str()]).inc();
                Ok(updated)
            }
            None => {
                let current = self.get_invoice(invoice_id).await?;
                Err(InvoicingError::InvalidInvoiceTransition {
                    from: current.status,
                    to: status,
                })
            }
        }
    }

    /// Deletes an unpaid invoice and makes its task invoiceable again.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<Invoice, InvoicingError> {
        let invoice = self.get_invoice(invoice_id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(InvoicingError::InvoicePaid);
        }

        match self.store.delete_invoice(invoice_id).await? {
            Some(deleted) => {
                INVOICES_TOTAL.with_label_values(&["deleted"]).inc();
                Ok(deleted)
            }
            None => match self.store.get_invoice(invoice_id).await? {
                Some(_) => Err(InvoicingError::InvoicePaid),
                None => Err(InvoicingError::NotFound("Invoice")),
            },
        }
    }
}

fn ensure_positive(value: Decimal, field: &str) -> Result<(), InvoicingError> {
    if value <= Decimal::ZERO {
        return Err(InvoicingError::Validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}

fn ensure_hours(value: Decimal, field: &str) -> Result<(), InvoicingError> {
    ensure_bounded(value, field, MAX_HOURS)
}

fn ensure_hourly_rate(value: Decimal) -> Result<(), InvoicingError> {
    ensure_bounded(value, "hourly_rate", MAX_HOURLY_RATE)
}

fn ensure_bounded(value: Decimal, field: &str, limit: Decimal) -> Result<(), InvoicingError> {
    ensure_positive(value, field)?;
    if value.normalize().scale() > AMOUNT_SCALE {
        return Err(InvoicingError::Validation(format!(
            "{} allows at most {} decimals",
            field, AMOUNT_SCALE
        )));
    }
    if value >= limit {
        return Err(InvoicingError::Validation(format!(
            "{} must be less than {}",
            field, limit
        )));
    }
    Ok(())
}
