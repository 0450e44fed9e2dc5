//! Services module for invoicing-service.

pub mod database;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod reconciler;
pub mod store;

pub use database::Database;
pub use error::InvoicingError;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use reconciler::InvoiceReconciler;
pub use store::InvoicingStore;
