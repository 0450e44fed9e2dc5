//! Prometheus metrics for inventory-service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder};

pub static GRPC_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inventory_grpc_requests_total",
        "Total number of gRPC requests",
        &["method", "status"]
    )
    .expect("Failed to register grpc_requests_total")
});

pub static GRPC_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "inventory_grpc_request_duration_seconds",
        "gRPC request duration in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register grpc_request_duration")
});

/// Stock movements by transaction type.
pub static STOCK_MOVEMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inventory_stock_movements_total",
        "Total number of stock movements by type",
        &["transaction_type"] // restock, usage, adjustment, waste
    )
    .expect("Failed to register stock_movements_total")
});

/// Alerts opened by the stock check.
pub static ALERTS_RAISED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inventory_alerts_raised_total",
        "Total number of stock alerts raised",
        &["alert_type"]
    )
    .expect("Failed to register alerts_raised_total")
});

pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "inventory_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "inventory_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (installs the HTTP recorder and forces lazy initialization).
pub fn init_metrics() {
    service_core::middleware::metrics::install_recorder();
    Lazy::force(&GRPC_REQUESTS_TOTAL);
    Lazy::force(&GRPC_REQUEST_DURATION);
    Lazy::force(&STOCK_MOVEMENTS_TOTAL);
    Lazy::force(&ALERTS_RAISED_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut output = encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default();
    output.push_str(&service_core::middleware::metrics::render());
    output
}
