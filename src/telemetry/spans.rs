//! Span utilities and extension traits for request tracing.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for per-request operation spans.
pub struct OperationSpan;

impl OperationSpan {
    /// Create a span for one IPC operation.
    ///
    /// `status` and `error.message` are filled in by
    /// [`SpanExt::record_result`]; `pool_id` by the handler once known.
    pub fn new(operation: &'static str) -> Span {
        info_span!(
            "ipc_request",
            operation,
            pool_id = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
