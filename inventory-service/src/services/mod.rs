//! Services module for inventory-service.

pub mod database;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::Database;
pub use error::InventoryError;
pub use ledger::StockLedger;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::InventoryStore;
