//! Common test utilities for invoicing-service integration tests.

use chrono::{NaiveDate, NaiveTime};
use invoicing_service::config::InvoicingConfig;
use invoicing_service::grpc::proto::invoicing_service_client::InvoicingServiceClient;
use invoicing_service::models::{CreateCustomer, CreateTask, Customer, Task, TaskStatus};
use invoicing_service::services::{InMemoryStore, InvoiceReconciler, InvoicingStore};
use invoicing_service::startup::Application;
use rust_decimal::Decimal;
use service_core::config::{Config as CommonConfig, DatabaseConfig};
use std::sync::{Arc, Once};
use tonic::transport::Channel;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_config(database_url: String) -> InvoicingConfig {
    InvoicingConfig {
        common: CommonConfig { port: 0 },
        service_name: "invoicing-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
        default_hourly_rate: Decimal::from(349),
    }
}

/// Reconciler backed by a fresh in-memory store.
#[allow(dead_code)]
pub fn reconciler() -> Arc<InvoiceReconciler> {
    init_tracing();
    let store: Arc<dyn InvoicingStore> = Arc::new(InMemoryStore::new());
    Arc::new(InvoiceReconciler::new(store, Decimal::from(349)))
}

#[allow(dead_code)]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[allow(dead_code)]
pub async fn seed_customer(reconciler: &InvoiceReconciler, hourly_rate: Option<Decimal>) -> Customer {
    reconciler
        .create_customer(CreateCustomer {
            name: "Anna Berg".to_string(),
            address: "Storgatan 1, 111 22 Stockholm".to_string(),
            phone: "070-123 45 67".to_string(),
            email: "anna@example.com".to_string(),
            hourly_rate,
            notes: None,
        })
        .await
        .expect("Failed to create customer")
}

#[allow(dead_code)]
pub async fn seed_task(
    reconciler: &InvoiceReconciler,
    customer: &Customer,
    scheduled_date: NaiveDate,
    estimated_hours: Decimal,
) -> Task {
    reconciler
        .create_task(CreateTask {
            customer_id: customer.customer_id,
            employee_id: None,
            scheduled_date,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            estimated_duration_hours: estimated_hours,
            notes: Some("Weekly cleaning".to_string()),
        })
        .await
        .expect("Failed to create task")
}

/// A completed task for a customer at the given rate.
#[allow(dead_code)]
pub async fn seed_completed_task(
    reconciler: &InvoiceReconciler,
    hourly_rate: Decimal,
    estimated_hours: Decimal,
    actual_hours: Option<Decimal>,
) -> (Customer, Task) {
    let customer = seed_customer(reconciler, Some(hourly_rate)).await;
    let task = seed_task(reconciler, &customer, date(2024, 3, 1), estimated_hours).await;
    let task = reconciler
        .update_task_status(task.task_id, TaskStatus::Completed, actual_hours)
        .await
        .expect("Failed to complete task");
    (customer, task)
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub grpc_client: InvoicingServiceClient<Channel>,
    pub http_port: u16,
    pub grpc_port: u16,
}

async fn serve(app: Application) -> TestApp {
    let http_port = app.http_port();
    let grpc_port = app.grpc_port();
    let grpc_addr = format!("http://127.0.0.1:{}", grpc_port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let grpc_client = {
        let mut attempts = 0;
        loop {
            match InvoicingServiceClient::connect(grpc_addr.clone()).await {
                Ok(client) => break client,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
            }
        }
    };

    TestApp {
        grpc_client,
        http_port,
        grpc_port,
    }
}

/// Spawn the service on an in-memory store.
#[allow(dead_code)]
pub async fn spawn_app() -> TestApp {
    init_tracing();
    let store: Arc<dyn InvoicingStore> = Arc::new(InMemoryStore::new());
    let app = Application::build_with_store(test_config(String::new()), store)
        .await
        .expect("Failed to build application");
    serve(app).await
}

/// Spawn the service against PostgreSQL.
#[allow(dead_code)]
pub async fn spawn_pg_app() -> TestApp {
    init_tracing();
    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run PostgreSQL tests");
    let app = Application::build(test_config(database_url))
        .await
        .expect("Failed to build application");
    serve(app).await
}
