//! gRPC utilities shared by the cleanops services.
//!
//! This module provides shared gRPC infrastructure including:
//! - Error conversion between `AppError` and `tonic::Status`
//! - Interceptors for trace context propagation
//! - Wire conversions for decimals, dates, ids and timestamps

pub mod convert;
pub mod error;
pub mod interceptors;

pub use convert::{
    datetime_to_timestamp, format_decimal, optional_string, parse_date, parse_decimal,
    parse_optional_decimal, parse_optional_uuid, parse_uuid,
};
pub use error::{GrpcResult, IntoStatus};
pub use interceptors::{
    REQUEST_ID_KEY, TRACEPARENT_KEY, extract_request_id, extract_traceparent,
    trace_context_interceptor,
};

// Re-export commonly used tonic types
pub use tonic::{Code, Request, Response, Status};
