//! Telemetry for AQUA.
//!
//! Structured logging via `tracing`, request spans, and `metrics` facade
//! gauges/counters for pool occupancy.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    forget_pool, record_allocation, record_free, record_pool_state, record_reclaiming,
};
pub use spans::{OperationSpan, SpanExt};
