//! In-memory store for tests and local runs.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    CreateTask, Customer, Invoice, InvoiceStatus, NewCustomer, NewInvoice, Task, TaskFilter,
    TaskStatus, TaskStatusUpdate,
};
use crate::services::error::InvoicingError;
use crate::services::store::InvoicingStore;

#[derive(Default)]
struct State {
    customers: HashMap<Uuid, Customer>,
    tasks: HashMap<Uuid, Task>,
    /// Insertion order, oldest first.
    invoices: Vec<Invoice>,
}

/// Every operation runs under one lock, which gives the same guarantees as
/// the conditional statements of the Postgres store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoicingStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), InvoicingError> {
        Ok(())
    }

    async fn create_customer(&self, input: &NewCustomer) -> Result<Customer, InvoicingError> {
        let customer = Customer {
            customer_id: Uuid::new_v4(),
            name: input.name.clone(),
            address: input.address.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            hourly_rate: input.hourly_rate,
            notes: input.notes.clone(),
            created_utc: Utc::now(),
        };
        self.state
            .lock()
            .await
            .customers
            .insert(customer.customer_id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, InvoicingError> {
        Ok(self.state.lock().await.customers.get(&customer_id).cloned())
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, InvoicingError> {
        let state = self.state.lock().await;
        let mut customers: Vec<Customer> = state.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_utc.cmp(&b.created_utc)));
        Ok(customers)
    }

    async fn update_customer_rate(
        &self,
        customer_id: Uuid,
        hourly_rate: Decimal,
    ) -> Result<Option<Customer>, InvoicingError> {
        let mut state = self.state.lock().await;
        Ok(state.customers.get_mut(&customer_id).map(|customer| {
            customer.hourly_rate = hourly_rate;
            customer.clone()
        }))
    }

    async fn create_task(&self, input: &CreateTask) -> Result<Task, InvoicingError> {
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&input.customer_id) {
            return Err(InvoicingError::NotFound("Customer"));
        }
        let task = Task {
            task_id: Uuid::new_v4(),
            customer_id: input.customer_id,
            employee_id: input.employee_id,
            scheduled_date: input.scheduled_date,
            start_time: input.start_time,
            estimated_duration_hours: input.estimated_duration_hours,
            actual_duration_hours: None,
            status: TaskStatus::Planned,
            invoice_generated: false,
            invoiced_utc: None,
            notes: input.notes.clone(),
            completed_utc: None,
            created_utc: Utc::now(),
        };
        state.tasks.insert(task.task_id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, InvoicingError> {
        Ok(self.state.lock().await.tasks.get(&task_id).cloned())
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, InvoicingError> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            (b.scheduled_date, b.start_time).cmp(&(a.scheduled_date, a.start_time))
        });
        Ok(tasks)
    }

    async fn update_task_status(
        &self,
        task_id: Uuid,
        from: TaskStatus,
        update: &TaskStatusUpdate,
    ) -> Result<Option<Task>, InvoicingError> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if task.status != from {
            return Ok(None);
        }
        task.status = update.status;
        if update.actual_duration_hours.is_some() {
            task.actual_duration_hours = update.actual_duration_hours;
        }
        if update.completed_utc.is_some() {
            task.completed_utc = update.completed_utc;
        }
        Ok(Some(task.clone()))
    }

    async fn insert_invoice_for_task(&self, input: &NewInvoice) -> Result<Invoice, InvoicingError> {
        let mut state = self.state.lock().await;

        if state
            .invoices
            .iter()
            .any(|inv| inv.invoice_number == input.invoice_number)
        {
            return Err(InvoicingError::DuplicateInvoiceNumber(
                input.invoice_number.clone(),
            ));
        }

        let task = state
            .tasks
            .get_mut(&input.task_id)
            .ok_or(InvoicingError::TaskOrCustomerNotFound)?;
        if task.invoice_generated {
            return Err(InvoicingError::AlreadyInvoiced(input.task_id));
        }

        let now = Utc::now();
        task.invoice_generated = true;
        task.invoiced_utc = Some(now);

        let amounts = &input.amounts;
        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            invoice_number: input.invoice_number.clone(),
            task_id: input.task_id,
            customer_id: input.customer_id,
            customer_name: input.customer_name.clone(),
            customer_address: input.customer_address.clone(),
            task_date: input.task_date,
            hours: amounts.hours,
            hourly_rate: amounts.hourly_rate,
            total_amount: amounts.total,
            net_amount: amounts.net,
            vat_amount: amounts.vat,
            status: InvoiceStatus::Draft,
            issued_date: input.issued_date,
            due_date: input.due_date,
            paid_date: None,
            notes: input.notes.clone(),
            created_utc: now,
        };
        state.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError> {
        let state = self.state.lock().await;
        Ok(state
            .invoices
            .iter()
            .find(|inv| inv.invoice_id == invoice_id)
            .cloned())
    }

    async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let state = self.state.lock().await;
        Ok(state
            .invoices
            .iter()
            .rev()
            .filter(|inv| status.is_none_or(|s| s == inv.status))
            .cloned()
            .collect())
    }

    async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<Option<Invoice>, InvoicingError> {
        let mut state = self.state.lock().await;
        let Some(invoice) = state
            .invoices
            .iter_mut()
            .find(|inv| inv.invoice_id == invoice_id && inv.status == from)
        else {
            return Ok(None);
        };
        invoice.status = to;
        if paid_date.is_some() {
            invoice.paid_date = paid_date;
        }
        Ok(Some(invoice.clone()))
    }

    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError> {
        let mut state = self.state.lock().await;
        let Some(position) = state
            .invoices
            .iter()
            .position(|inv| inv.invoice_id == invoice_id && inv.status != InvoiceStatus::Paid)
        else {
            return Ok(None);
        };
        let invoice = state.invoices.remove(position);
        if let Some(task) = state.tasks.get_mut(&invoice.task_id) {
            task.invoice_generated = false;
            task.invoiced_utc = None;
        }
        Ok(Some(invoice))
    }
}
