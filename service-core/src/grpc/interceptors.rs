//! gRPC interceptors for cross-cutting concerns.

use tonic::{Request, Status};

/// gRPC metadata key for W3C traceparent header.
pub const TRACEPARENT_KEY: &str = "traceparent";

/// gRPC metadata key for request ID.
pub const REQUEST_ID_KEY: &str = "x-request-id";

/// Interceptor that extracts trace context from incoming requests.
///
/// Reads the `traceparent` and `x-request-id` metadata and records them on
/// the current span.
#[allow(clippy::result_large_err)]
pub fn trace_context_interceptor(request: Request<()>) -> Result<Request<()>, Status> {
    if let Some(traceparent) = extract_traceparent(&request) {
        tracing::debug!(traceparent = %traceparent, "Received trace context");
    }

    if let Some(request_id) = extract_request_id(&request) {
        tracing::Span::current().record("request_id", request_id.as_str());
    }

    Ok(request)
}

/// Extract the traceparent value from incoming gRPC request metadata.
pub fn extract_traceparent<T>(request: &Request<T>) -> Option<String> {
    request
        .metadata()
        .get(TRACEPARENT_KEY)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract request ID from incoming gRPC request metadata.
pub fn extract_request_id<T>(request: &Request<T>) -> Option<String> {
    request
        .metadata()
        .get(REQUEST_ID_KEY)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_request_id() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert(REQUEST_ID_KEY, "test-request-123".parse().unwrap());

        assert_eq!(
            extract_request_id(&request),
            Some("test-request-123".to_string())
        );
    }

    #[test]
    fn test_extract_traceparent_missing() {
        let request = Request::new(());
        assert_eq!(extract_traceparent(&request), None);
    }

    #[test]
    fn test_interceptor_passes_through() {
        let request = Request::new(());
        let result = trace_context_interceptor(request);
        assert!(result.is_ok());
    }
}
