//! Invoicing Service - turns completed cleaning tasks into invoices.

pub mod config;
pub mod grpc;
pub mod models;
pub mod services;
pub mod startup;
