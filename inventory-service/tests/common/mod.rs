//! Common test utilities for inventory-service integration tests.

use inventory_service::config::InventoryConfig;
use inventory_service::grpc::proto::inventory_service_client::InventoryServiceClient;
use inventory_service::models::{CreateItem, InventoryItem, ItemCategory};
use inventory_service::services::{InMemoryStore, InventoryStore, StockLedger};
use inventory_service::startup::Application;
use rust_decimal::Decimal;
use service_core::config::{Config as CommonConfig, DatabaseConfig};
use std::sync::{Arc, Once};
use tonic::transport::Channel;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,inventory_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_config(database_url: String) -> InventoryConfig {
    InventoryConfig {
        common: CommonConfig { port: 0 },
        service_name: "inventory-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
    }
}

/// Ledger backed by a fresh in-memory store.
#[allow(dead_code)]
pub fn ledger() -> Arc<StockLedger> {
    init_tracing();
    let store: Arc<dyn InventoryStore> = Arc::new(InMemoryStore::new());
    Arc::new(StockLedger::new(store))
}

#[allow(dead_code)]
pub fn new_item(name: &str, initial_stock: Decimal, minimum_stock: Decimal) -> CreateItem {
    CreateItem {
        name: name.to_string(),
        category: ItemCategory::CleaningSupplies,
        initial_stock,
        minimum_stock,
        unit: "bottles".to_string(),
        cost_per_unit: Decimal::new(3990, 2),
        supplier: Some("Städgrossisten AB".to_string()),
        notes: None,
    }
}

#[allow(dead_code)]
pub async fn seed_item(
    ledger: &StockLedger,
    initial_stock: Decimal,
    minimum_stock: Decimal,
) -> InventoryItem {
    ledger
        .add_item(new_item("Allrengöring", initial_stock, minimum_stock))
        .await
        .expect("Failed to add item")
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub grpc_client: InventoryServiceClient<Channel>,
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

    let mut attempts = 0;
    let grpc_client = loop {
        match InventoryServiceClient::connect(grpc_addr.clone()).await {
            Ok(client) => break client,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
        }
    };

    TestApp {
        grpc_client,
        http_port,
        grpc_port,
    }
}

#[allow(dead_code)]
pub async fn spawn_app() -> TestApp {
    init_tracing();
    let store: Arc<dyn InventoryStore> = Arc::new(InMemoryStore::new());
    let app = Application::build_with_store(test_config(String::new()), store)
        .await
        .expect("Failed to build application");
    serve(app).await
}

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
