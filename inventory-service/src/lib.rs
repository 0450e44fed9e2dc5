//! Inventory Service - stock levels for cleaning supplies backed by an
//! append-only transaction ledger.

pub mod config;
pub mod grpc;
pub mod models;
pub mod services;
pub mod startup;
