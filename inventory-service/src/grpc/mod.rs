//! gRPC module for inventory-service.

mod service;

pub use service::InventoryServiceImpl;
pub use service_core::grpc::trace_context_interceptor;

/// Generated protobuf code.
pub mod proto {
    tonic::include_proto!("cleanops.inventory.v1");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("inventory_descriptor");
}
