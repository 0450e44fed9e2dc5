//! InvoicingService gRPC implementation.

use crate::grpc::proto::{
    invoicing_service_server::InvoicingService, CreateCustomerRequest, CreateCustomerResponse,
    CreateInvoiceFromTaskRequest, CreateInvoiceFromTaskResponse, CreateTaskRequest,
    CreateTaskResponse, Customer as ProtoCustomer, DeleteInvoiceRequest, DeleteInvoiceResponse,
    GetCustomerRequest, GetCustomerResponse, GetInvoiceRequest, GetInvoiceResponse,
    GetTaskRequest, GetTaskResponse, Invoice as ProtoInvoice, InvoiceStatus as ProtoInvoiceStatus,
    ListCustomersRequest, ListCustomersResponse, ListInvoiceableTasksRequest,
    ListInvoiceableTasksResponse, ListInvoicesRequest, ListInvoicesResponse, ListTasksRequest,
    ListTasksResponse, Task as ProtoTask, TaskStatus as ProtoTaskStatus,
    UpdateCustomerRateRequest, UpdateCustomerRateResponse, UpdateInvoiceStatusRequest,
    UpdateInvoiceStatusResponse, UpdateTaskStatusRequest, UpdateTaskStatusResponse,
};
use crate::models::{CreateCustomer, CreateTask, Customer, Invoice, InvoiceStatus, Task, TaskStatus};
use crate::services::metrics::{ERRORS_TOTAL, GRPC_REQUESTS_TOTAL, GRPC_REQUEST_DURATION};
use crate::services::InvoiceReconciler;
use chrono::NaiveTime;
use service_core::error::AppError;
use service_core::grpc::{
    datetime_to_timestamp, format_decimal, optional_string, parse_date, parse_decimal,
    parse_optional_decimal, parse_optional_uuid, parse_uuid, IntoStatus,
};
use std::future::Future;
use std::sync::Arc;
use tonic::{Code, Request, Response, Status};
use tracing::{instrument, warn, Span};

/// InvoicingService implementation.
pub struct InvoicingServiceImpl {
    reconciler: Arc<InvoiceReconciler>,
}

impl InvoicingServiceImpl {
    pub fn new(reconciler: Arc<InvoiceReconciler>) -> Self {
        Self { reconciler }
    }

    /// Time a handler body and account for its outcome.
    async fn observe<T, F>(&self, method: &'static str, body: F) -> Result<Response<T>, Status>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let timer = GRPC_REQUEST_DURATION
            .with_label_values(&[method])
            .start_timer();
        let result = body.await;
        timer.observe_duration();

        match result {
            Ok(response) => {
                GRPC_REQUESTS_TOTAL.with_label_values(&[method, "ok"]).inc();
                Ok(Response::new(response))
            }
            Err(err) => {
                let error_type = match &err {
                    AppError::BadRequest(_) => "validation_error",
                    AppError::NotFound(_) => "not_found",
                    AppError::Conflict(_) | AppError::FailedPrecondition(_) => "rejected",
                    AppError::DatabaseError(_) => "db_error",
                    _ => "internal_error",
                };
                ERRORS_TOTAL.with_label_values(&[error_type]).inc();
                warn!(method, error = %err, "Request failed");

                let status = err.into_status();
                GRPC_REQUESTS_TOTAL
                    .with_label_values(&[method, status_label(status.code())])
                    .inc();
                Err(status)
            }
        }
    }

    fn customer_to_proto(customer: &Customer) -> ProtoCustomer {
        ProtoCustomer {
            customer_id: customer.customer_id.to_string(),
            name: customer.name.clone(),
            address: customer.address.clone(),
            phone: customer.phone.clone(),
            email: customer.email.clone(),
            hourly_rate: format_decimal(&customer.hourly_rate),
            notes: customer.notes.clone().unwrap_or_default(),
            created_at: Some(datetime_to_timestamp(customer.created_utc)),
        }
    }

    fn task_to_proto(task: &Task) -> ProtoTask {
        ProtoTask {
            task_id: task.task_id.to_string(),
            customer_id: task.customer_id.to_string(),
            employee_id: task
                .employee_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            scheduled_date: task.scheduled_date.to_string(),
            start_time: task.start_time.format("%H:%M").to_string(),
            estimated_duration_hours: format_decimal(&task.estimated_duration_hours),
            actual_duration_hours: task
                .actual_duration_hours
                .as_ref()
                .map(format_decimal)
                .unwrap_or_default(),
            status: task_status_to_proto(task.status) as i32,
            invoice_generated: task.invoice_generated,
            invoiced_at: task.invoiced_utc.map(datetime_to_timestamp),
            notes: task.notes.clone().unwrap_or_default(),
            completed_at: task.completed_utc.map(datetime_to_timestamp),
            created_at: Some(datetime_to_timestamp(task.created_utc)),
        }
    }

    fn invoice_to_proto(invoice: &Invoice) -> ProtoInvoice {
        ProtoInvoice {
            invoice_id: invoice.invoice_id.to_string(),
            invoice_number: invoice.invoice_number.clone(),
            task_id: invoice.task_id.to_string(),
            customer_id: invoice.customer_id.to_string(),
            customer_name: invoice.customer_name.clone(),
            customer_address: invoice.customer_address.clone(),
            task_date: invoice.task_date.to_string(),
            hours: format_decimal(&invoice.hours),
            hourly_rate: format_decimal(&invoice.hourly_rate),
            total_amount: format_decimal(&invoice.total_amount),
            net_amount: format_decimal(&invoice.net_amount),
            vat_amount: format_decimal(&invoice.vat_amount),
            status: invoice_status_to_proto(invoice.status) as i32,
            issued_date: invoice.issued_date.to_string(),
            due_date: invoice.due_date.to_string(),
            paid_date: invoice
                .paid_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            notes: invoice.notes.clone().unwrap_or_default(),
            created_at: Some(datetime_to_timestamp(invoice.created_utc)),
        }
    }
}

fn status_label(code: Code) -> &'static str {
    match code {
        Code::InvalidArgument => "invalid_argument",
        Code::NotFound => "not_found",
        Code::AlreadyExists => "already_exists",
        Code::FailedPrecondition => "failed_precondition",
        Code::Unavailable => "unavailable",
        _ => "internal",
    }
}

fn task_status_to_proto(status: TaskStatus) -> ProtoTaskStatus {
    match status {
        TaskStatus::Planned => ProtoTaskStatus::Planned,
        TaskStatus::InProgress => ProtoTaskStatus::InProgress,
        TaskStatus::Completed => ProtoTaskStatus::Completed,
        TaskStatus::Cancelled => ProtoTaskStatus::Cancelled,
    }
}

/// `Unspecified` maps to `None`.
fn task_status_from_proto(value: i32) -> Result<Option<TaskStatus>, AppError> {
    match ProtoTaskStatus::try_from(value) {
        Ok(ProtoTaskStatus::Unspecified) => Ok(None),
        Ok(ProtoTaskStatus::Planned) => Ok(Some(TaskStatus::Planned)),
        Ok(ProtoTaskStatus::InProgress) => Ok(Some(TaskStatus::InProgress)),
        Ok(ProtoTaskStatus::Completed) => Ok(Some(TaskStatus::Completed)),
        Ok(ProtoTaskStatus::Cancelled) => Ok(Some(TaskStatus::Cancelled)),
        Err(_) => Err(AppError::BadRequest(anyhow::anyhow!("Invalid status value"))),
    }
}

fn invoice_status_to_proto(status: InvoiceStatus) -> ProtoInvoiceStatus {
    match status {
        InvoiceStatus::Draft => ProtoInvoiceStatus::Draft,
        InvoiceStatus::Sent => ProtoInvoiceStatus::Sent,
        InvoiceStatus::Paid => ProtoInvoiceStatus::Paid,
        InvoiceStatus::Overdue => ProtoInvoiceStatus::Overdue,
    }
}

/// `Unspecified` maps to `None`.
fn invoice_status_from_proto(value: i32) -> Result<Option<InvoiceStatus>, AppError> {
    match ProtoInvoiceStatus::try_from(value) {
        Ok(ProtoInvoiceStatus::Unspecified) => Ok(None),
        Ok(ProtoInvoiceStatus::Draft) => Ok(Some(InvoiceStatus::Draft)),
        Ok(ProtoInvoiceStatus::Sent) => Ok(Some(InvoiceStatus::Sent)),
        Ok(ProtoInvoiceStatus::Paid) => Ok(Some(InvoiceStatus::Paid)),
        Ok(ProtoInvoiceStatus::Overdue) => Ok(Some(InvoiceStatus::Overdue)),
        Err(_) => Err(AppError::BadRequest(anyhow::anyhow!("Invalid status value"))),
    }
}

fn parse_start_time(value: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid start_time format")))
}

fn required_status<T>(status: Option<T>) -> Result<T, AppError> {
    status.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("status is required")))
}

#[tonic::async_trait]
impl InvoicingService for InvoicingServiceImpl {
    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "CreateCustomer", customer_id)
    )]
    async fn create_customer(
        &self,
        request: Request<CreateCustomerRequest>,
    ) -> Result<Response<CreateCustomerResponse>, Status> {
        let req = request.into_inner();
        self.observe("CreateCustomer", async move {
            let input = CreateCustomer {
                hourly_rate: parse_optional_decimal(&req.hourly_rate, "hourly_rate")?,
                name: req.name,
                address: req.address,
                phone: req.phone,
                email: req.email,
                notes: optional_string(req.notes),
            };
            let customer = self.reconciler.create_customer(input).await?;
            Span::current().record("customer_id", customer.customer_id.to_string());
            Ok::<_, AppError>(CreateCustomerResponse {
                customer: Some(Self::customer_to_proto(&customer)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "GetCustomer", customer_id)
    )]
    async fn get_customer(
        &self,
        request: Request<GetCustomerRequest>,
    ) -> Result<Response<GetCustomerResponse>, Status> {
        let req = request.into_inner();
        self.observe("GetCustomer", async move {
            let customer_id = parse_uuid(&req.customer_id, "customer_id")?;
            Span::current().record("customer_id", customer_id.to_string());
            let customer = self.reconciler.get_customer(customer_id).await?;
            Ok::<_, AppError>(GetCustomerResponse {
                customer: Some(Self::customer_to_proto(&customer)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, _request),
        fields(service = "invoicing-service", method = "ListCustomers")
    )]
    async fn list_customers(
        &self,
        _request: Request<ListCustomersRequest>,
    ) -> Result<Response<ListCustomersResponse>, Status> {
        self.observe("ListCustomers", async move {
            let customers = self.reconciler.list_customers().await?;
            Ok::<_, AppError>(ListCustomersResponse {
                customers: customers.iter().map(Self::customer_to_proto).collect(),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "UpdateCustomerRate", customer_id)
    )]
    async fn update_customer_rate(
        &self,
        request: Request<UpdateCustomerRateRequest>,
    ) -> Result<Response<UpdateCustomerRateResponse>, Status> {
        let req = request.into_inner();
        self.observe("UpdateCustomerRate", async move {
            let customer_id = parse_uuid(&req.customer_id, "customer_id")?;
            Span::current().record("customer_id", customer_id.to_string());
            let hourly_rate = parse_decimal(&req.hourly_rate, "hourly_rate")?;
            let customer = self
                .reconciler
                .update_customer_rate(customer_id, hourly_rate)
                .await?;
            Ok::<_, AppError>(UpdateCustomerRateResponse {
                customer: Some(Self::customer_to_proto(&customer)),
            })
        })
        .await
    }

    // -------------------------------------------------------------------------
    // Tasks
    // -------------------------------------------------------------------------

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "CreateTask", task_id)
    )]
    async fn create_task(
        &self,
        request: Request<CreateTaskRequest>,
    ) -> Result<Response<CreateTaskResponse>, Status> {
        let req = request.into_inner();
        self.observe("CreateTask", async move {
            let input = CreateTask {
                customer_id: parse_uuid(&req.customer_id, "customer_id")?,
                employee_id: parse_optional_uuid(&req.employee_id, "employee_id")?,
                scheduled_date: parse_date(&req.scheduled_date, "scheduled_date")?,
                start_time: parse_start_time(&req.start_time)?,
                estimated_duration_hours: parse_decimal(
                    &req.estimated_duration_hours,
                    "estimated_duration_hours",
                )?,
                notes: optional_string(req.notes),
            };
            let task = self.reconciler.create_task(input).await?;
            Span::current().record("task_id", task.task_id.to_string());
            Ok::<_, AppError>(CreateTaskResponse {
                task: Some(Self::task_to_proto(&task)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "GetTask", task_id)
    )]
    async fn get_task(
        &self,
        request: Request<GetTaskRequest>,
    ) -> Result<Response<GetTaskResponse>, Status> {
        let req = request.into_inner();
        self.observe("GetTask", async move {
            let task_id = parse_uuid(&req.task_id, "task_id")?;
            Span::current().record("task_id", task_id.to_string());
            let task = self.reconciler.get_task(task_id).await?;
            Ok::<_, AppError>(GetTaskResponse {
                task: Some(Self::task_to_proto(&task)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "ListTasks")
    )]
    async fn list_tasks(
        &self,
        request: Request<ListTasksRequest>,
    ) -> Result<Response<ListTasksResponse>, Status> {
        let req = request.into_inner();
        self.observe("ListTasks", async move {
            let status = task_status_from_proto(req.status)?;
            let tasks = self.reconciler.list_tasks(status).await?;
            Ok::<_, AppError>(ListTasksResponse {
                tasks: tasks.iter().map(Self::task_to_proto).collect(),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "UpdateTaskStatus", task_id)
    )]
    async fn update_task_status(
        &self,
        request: Request<UpdateTaskStatusRequest>,
    ) -> Result<Response<UpdateTaskStatusResponse>, Status> {
        let req = request.into_inner();
        self.observe("UpdateTaskStatus", async move {
            let task_id = parse_uuid(&req.task_id, "task_id")?;
            Span::current().record("task_id", task_id.to_string());
            let status = required_status(task_status_from_proto(req.status)?)?;
            let actual = parse_optional_decimal(&req.actual_duration_hours, "actual_duration_hours")?;
            let task = self
                .reconciler
                .update_task_status(task_id, status, actual)
                .await?;
            Ok::<_, AppError>(UpdateTaskStatusResponse {
                task: Some(Self::task_to_proto(&task)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, _request),
        fields(service = "invoicing-service", method = "ListInvoiceableTasks")
    )]
    async fn list_invoiceable_tasks(
        &self,
        _request: Request<ListInvoiceableTasksRequest>,
    ) -> Result<Response<ListInvoiceableTasksResponse>, Status> {
        self.observe("ListInvoiceableTasks", async move {
            let tasks = self.reconciler.list_invoiceable_tasks().await?;
            Ok::<_, AppError>(ListInvoiceableTasksResponse {
                tasks: tasks.iter().map(Self::task_to_proto).collect(),
            })
        })
        .await
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "CreateInvoiceFromTask", task_id, invoice_id)
    )]
    async fn create_invoice_from_task(
        &self,
        request: Request<CreateInvoiceFromTaskRequest>,
    ) -> Result<Response<CreateInvoiceFromTaskResponse>, Status> {
        let req = request.into_inner();
        self.observe("CreateInvoiceFromTask", async move {
            let task_id = parse_uuid(&req.task_id, "task_id")?;
            Span::current().record("task_id", task_id.to_string());
            let invoice = self.reconciler.create_invoice_from_task(task_id).await?;
            Span::current().record("invoice_id", invoice.invoice_id.to_string());
            Ok::<_, AppError>(CreateInvoiceFromTaskResponse {
                invoice: Some(Self::invoice_to_proto(&invoice)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "GetInvoice", invoice_id)
    )]
    async fn get_invoice(
        &self,
        request: Request<GetInvoiceRequest>,
    ) -> Result<Response<GetInvoiceResponse>, Status> {
        let req = request.into_inner();
        self.observe("GetInvoice", async move {
            let invoice_id = parse_uuid(&req.invoice_id, "invoice_id")?;
            Span::current().record("invoice_id", invoice_id.to_string());
            let invoice = self.reconciler.get_invoice(invoice_id).await?;
            Ok::<_, AppError>(GetInvoiceResponse {
                invoice: Some(Self::invoice_to_proto(&invoice)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "ListInvoices")
    )]
    async fn list_invoices(
        &self,
        request: Request<ListInvoicesRequest>,
    ) -> Result<Response<ListInvoicesResponse>, Status> {
        let req = request.into_inner();
        self.observe("ListInvoices", async move {
            let status = invoice_status_from_proto(req.status)?;
            let invoices = self.reconciler.list_invoices(status).await?;
            Ok::<_, AppError>(ListInvoicesResponse {
                invoices: invoices.iter().map(Self::invoice_to_proto).collect(),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "UpdateInvoiceStatus", invoice_id)
    )]
    async fn update_invoice_status(
        &self,
        request: Request<UpdateInvoiceStatusRequest>,
    ) -> Result<Response<UpdateInvoiceStatusResponse>, Status> {
        let req = request.into_inner();
        self.observe("UpdateInvoiceStatus", async move {
            let invoice_id = parse_uuid(&req.invoice_id, "invoice_id")?;
            Span::current().record("invoice_id", invoice_id.to_string());
            let status = required_status(invoice_status_from_proto(req.status)?)?;
            let invoice = self
                .reconciler
                .update_invoice_status(invoice_id, status)
                .await?;
            Ok::<_, AppError>(UpdateInvoiceStatusResponse {
                invoice: Some(Self::invoice_to_proto(&invoice)),
            })
        })
        .await
    }

    #[instrument(
        skip(self, request),
        fields(service = "invoicing-service", method = "DeleteInvoice", invoice_id)
    )]
    async fn delete_invoice(
        &self,
        request: Request<DeleteInvoiceRequest>,
    ) -> Result<Response<DeleteInvoiceResponse>, Status> {
        let req = request.into_inner();
        self.observe("DeleteInvoice", async move {
            let invoice_id = parse_uuid(&req.invoice_id, "invoice_id")?;
            Span::current().record("invoice_id", invoice_id.to_string());
            self.reconciler.delete_invoice(invoice_id).await?;
            Ok::<_, AppError>(DeleteInvoiceResponse { success: true })
        })
        .await
    }
}
