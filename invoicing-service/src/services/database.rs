//! PostgreSQL store for invoicing-service.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CreateTask, Customer, Invoice, InvoiceStatus, NewCustomer, NewInvoice, Task, TaskFilter,
    TaskStatus, TaskStatusUpdate,
};
use crate::services::error::InvoicingError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::InvoicingStore;

macro_rules! customer_columns {
    () => {
        "customer_id, name, address, phone, email, hourly_rate, notes, created_utc"
    };
}

macro_rules! task_columns {
    () => {
        "task_id, customer_id, employee_id, scheduled_date, start_time, estimated_duration_hours, \
         actual_duration_hours, status, invoice_generated, invoiced_utc, notes, completed_utc, created_utc"
    };
}

macro_rules! invoice_columns {
    () => {
        "invoice_id, invoice_number, task_id, customer_id, customer_name, customer_address, task_date, \
         hours, hourly_rate, total_amount, net_amount, vat_amount, status, issued_date, due_date, \
         paid_date, notes, created_utc"
    };
}

const INVOICE_NUMBER_CONSTRAINT: &str = "invoices_invoice_number_unique";
const INVOICE_TASK_CONSTRAINT: &str = "invoices_task_id_unique";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn persistence(context: &str, err: sqlx::Error) -> InvoicingError {
    InvoicingError::Persistence(anyhow::anyhow!("{}: {}", context, err))
}

#[async_trait]
impl InvoicingStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), InvoicingError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| persistence("Health check failed", e))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_customer(&self, input: &NewCustomer) -> Result<Customer, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(concat!(
            "INSERT INTO customers (customer_id, name, address, phone, email, hourly_rate, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING ",
            customer_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(input.hourly_rate)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| persistence("Failed to create customer", e))?;

        timer.observe_duration();
        info!(customer_id = %customer.customer_id, "Customer created");
        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(concat!(
            "SELECT ",
            customer_columns!(),
            " FROM customers WHERE customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get customer", e))?;

        timer.observe_duration();
        Ok(customer)
    }

    #[instrument(skip(self))]
    async fn list_customers(&self) -> Result<Vec<Customer>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(concat!(
            "SELECT ",
            customer_columns!(),
            " FROM customers ORDER BY name, created_utc"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list customers", e))?;

        timer.observe_duration();
        Ok(customers)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn update_customer_rate(
        &self,
        customer_id: Uuid,
        hourly_rate: Decimal,
    ) -> Result<Option<Customer>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer_rate"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(concat!(
            "UPDATE customers SET hourly_rate = $2 WHERE customer_id = $1 RETURNING ",
            customer_columns!()
        ))
        .bind(customer_id)
        .bind(hourly_rate)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to update customer rate", e))?;

        timer.observe_duration();
        Ok(customer)
    }

    // -------------------------------------------------------------------------
    // Tasks
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    async fn create_task(&self, input: &CreateTask) -> Result<Task, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_task"])
            .start_timer();

        let task = sqlx::query_as::<_, Task>(concat!(
            "INSERT INTO tasks (task_id, customer_id, employee_id, scheduled_date, start_time, \
             estimated_duration_hours, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            task_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(input.customer_id)
        .bind(input.employee_id)
        .bind(input.scheduled_date)
        .bind(input.start_time)
        .bind(input.estimated_duration_hours)
        .bind(TaskStatus::Planned.as_str())
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                InvoicingError::NotFound("Customer")
            }
            _ => persistence("Failed to create task", e),
        })?;

        timer.observe_duration();
        info!(task_id = %task.task_id, "Task created");
        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %task_id))]
    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_task"])
            .start_timer();

        let task = sqlx::query_as::<_, Task>(concat!(
            "SELECT ",
            task_columns!(),
            " FROM tasks WHERE task_id = $1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get task", e))?;

        timer.observe_duration();
        Ok(task)
    }

    #[instrument(skip(self))]
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_tasks"])
            .start_timer();

        let tasks = sqlx::query_as::<_, Task>(concat!(
            "SELECT ",
            task_columns!(),
            " FROM tasks \
             WHERE ($1::VARCHAR IS NULL OR status = $1) \
               AND ($2::BOOLEAN IS NULL OR invoice_generated = $2) \
             ORDER BY scheduled_date DESC, start_time DESC"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.invoice_generated)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list tasks", e))?;

        timer.observe_duration();
        Ok(tasks)
    }

    #[instrument(skip(self, update), fields(task_id = %task_id, to = %update.status))]
    async fn update_task_status(
        &self,
        task_id: Uuid,
        from: TaskStatus,
        update: &TaskStatusUpdate,
    ) -> Result<Option<Task>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_task_status"])
            .start_timer();

        let task = sqlx::query_as::<_, Task>(concat!(
            "UPDATE tasks SET status = $3, \
                 actual_duration_hours = COALESCE($4, actual_duration_hours), \
                 completed_utc = COALESCE($5, completed_utc) \
             WHERE task_id = $1 AND status = $2 RETURNING ",
            task_columns!()
        ))
        .bind(task_id)
        .bind(from.as_str())
        .bind(update.status.as_str())
        .bind(update.actual_duration_hours)
        .bind(update.completed_utc)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to update task status", e))?;

        timer.observe_duration();
        if let Some(ref t) = task {
            info!(task_id = %t.task_id, status = %t.status, "Task status updated");
        }
        Ok(task)
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(task_id = %input.task_id, invoice_number = %input.invoice_number))]
    async fn insert_invoice_for_task(&self, input: &NewInvoice) -> Result<Invoice, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice_for_task"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("Failed to begin transaction", e))?;

        let flagged = sqlx::query(
            r#"
            UPDATE tasks
            SET invoice_generated = TRUE, invoiced_utc = NOW()
            WHERE task_id = $1 AND invoice_generated = FALSE
            "#,
        )
        .bind(input.task_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to flag task as invoiced", e))?;

        if flagged.rows_affected() == 0 {
            return Err(InvoicingError::AlreadyInvoiced(input.task_id));
        }

        let amounts = &input.amounts;
        let invoice = sqlx::query_as::<_, Invoice>(concat!(
            "INSERT INTO invoices (invoice_id, invoice_number, task_id, customer_id, customer_name, \
             customer_address, task_date, hours, hourly_rate, total_amount, net_amount, vat_amount, \
             status, issued_date, due_date, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING ",
            invoice_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(&input.invoice_number)
        .bind(input.task_id)
        .bind(input.customer_id)
        .bind(&input.customer_name)
        .bind(&input.customer_address)
        .bind(input.task_date)
        .bind(amounts.hours)
        .bind(amounts.hourly_rate)
        .bind(amounts.total)
        .bind(amounts.net)
        .bind(amounts.vat)
        .bind(InvoiceStatus::Draft.as_str())
        .bind(input.issued_date)
        .bind(input.due_date)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some(INVOICE_NUMBER_CONSTRAINT) =>
            {
                InvoicingError::DuplicateInvoiceNumber(input.invoice_number.clone())
            }
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some(INVOICE_TASK_CONSTRAINT) =>
            {
                InvoicingError::AlreadyInvoiced(input.task_id)
            }
            _ => persistence("Failed to insert invoice", e),
        })?;

        tx.commit()
            .await
            .map_err(|e| persistence("Failed to commit invoice", e))?;

        timer.observe_duration();
        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total_amount,
            "Invoice created"
        );
        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(concat!(
            "SELECT ",
            invoice_columns!(),
            " FROM invoices WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get invoice", e))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(concat!(
            "SELECT ",
            invoice_columns!(),
            " FROM invoices WHERE ($1::VARCHAR IS NULL OR status = $1) \
             ORDER BY created_utc DESC, invoice_number DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list invoices", e))?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id, from = %from, to = %to))]
    async fn update_invoice_status(
        &self,
        invoice_id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<Option<Invoice>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(concat!(
            "UPDATE invoices SET status = $3, paid_date = COALESCE($4, paid_date) \
             WHERE invoice_id = $1 AND status = $2 RETURNING ",
            invoice_columns!()
        ))
        .bind(invoice_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(paid_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to update invoice status", e))?;

        timer.observe_duration();
        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, status = %inv.status, "Invoice status updated");
        }
        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, InvoicingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("Failed to begin transaction", e))?;

        let deleted = sqlx::query_as::<_, Invoice>(concat!(
            "DELETE FROM invoices WHERE invoice_id = $1 AND status <> 'paid' RETURNING ",
            invoice_columns!()
        ))
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to delete invoice", e))?;

        let Some(invoice) = deleted else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE tasks
            SET invoice_generated = FALSE, invoiced_utc = NULL
            WHERE task_id = $1
            "#,
        )
        .bind(invoice.task_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to reset task invoice flag", e))?;

        tx.commit()
            .await
            .map_err(|e| persistence("Failed to commit invoice deletion", e))?;

        timer.observe_duration();
        info!(
            invoice_id = %invoice.invoice_id,
            task_id = %invoice.task_id,
            "Invoice deleted and task reopened for invoicing"
        );
        Ok(Some(invoice))
    }
}
