//! IPC module for AQUA.
//!
//! Local socket / named pipe transport carrying length-prefixed JSON frames.
//! This is the only external interface of the service.

mod connections;
mod handler;
pub mod protocol;
pub mod server;

pub use connections::{ConnectionConfig, ConnectionGuard, ConnectionPool};
pub use handler::{IpcHandler, IpcHandlerConfig};
pub use protocol::{
    decode_message, encode_message, encode_response, AllocateRequest, AllocateResponse,
    HealthCheckResponse, HealthCheckType, IpcMessage, ProtocolError, StatusReport,
};
pub use server::{IpcServerConfig, ServerError};
