//! Wire format for IPC messages.
//!
//! Every frame carries one JSON-encoded [`IpcMessage`], internally tagged by
//! `type`. Field names follow the leasing API clients already speak: `size`
//! for pool capacity, `memory` for allocation size, `source_gpu` for the
//! requesting device.
//!
//! # Security
//! - Message size limits are enforced before parsing
//! - Response size limits prevent resource exhaustion

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::health::HealthReport;
use crate::memory::{
    Allocation, AllocationId, PoolId, PoolSnapshot, ReclaimStatus, RequesterId,
};

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Allocation request from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateRequest {
    /// Bytes requested.
    pub memory: u64,
    /// Requesting device. Absent, non-numeric or out-of-range values map to
    /// the unmapped sentinel.
    #[serde(default, deserialize_with = "lenient_requester")]
    pub source_gpu: RequesterId,
}

/// Allocation reply. `allocation` is null when the request was not granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateResponse {
    pub allocation: Option<Allocation>,
    /// Why the request was not granted, if it was not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

/// Pool table and reclaim state, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub pools: Vec<PoolSnapshot>,
    pub reclaiming: Vec<PoolId>,
    pub allocations: usize,
}

/// Health check request types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthCheckType {
    Liveness,
    Readiness,
    Full,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub check_type: HealthCheckType,
    pub ok: bool,
    pub report: Option<HealthReport>,
}

/// All possible IPC message types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcMessage {
    #[serde(rename = "create_pool")]
    CreatePool {
        id: PoolId,
        #[serde(alias = "capacity")]
        size: u64,
        address: String,
    },

    #[serde(rename = "grow_pool")]
    GrowPool { id: PoolId, size: u64 },

    #[serde(rename = "pool_response")]
    PoolResponse(PoolSnapshot),

    #[serde(rename = "delete_pool")]
    DeletePool { id: PoolId },

    #[serde(rename = "delete_response")]
    DeleteResponse { deleted: bool },

    #[serde(rename = "allocate")]
    Allocate(AllocateRequest),

    #[serde(rename = "allocate_response")]
    AllocateResponse(AllocateResponse),

    /// Ids are opaque strings on the wire; ones that do not parse are
    /// treated as unknown allocations.
    #[serde(rename = "free")]
    Free { allocation_id: String },

    #[serde(rename = "free_response")]
    FreeResponse { freed: bool },

    #[serde(rename = "reclaim_request")]
    ReclaimRequest { id: PoolId },

    #[serde(rename = "reclaim_ack")]
    ReclaimAck { added: bool },

    #[serde(rename = "reclaim_cancel")]
    ReclaimCancel { id: PoolId },

    #[serde(rename = "reclaim_cancelled")]
    ReclaimCancelled { id: PoolId },

    #[serde(rename = "reclaim_status")]
    ReclaimStatusRequest { id: PoolId },

    #[serde(rename = "reclaim_status_response")]
    ReclaimStatusResponse(ReclaimStatus),

    #[serde(rename = "responsive_reclaim")]
    ResponsiveReclaim { allocations: Vec<String> },

    #[serde(rename = "responsive_response")]
    ResponsiveResponse { allocations: Vec<AllocationId> },

    #[serde(rename = "status_request")]
    StatusRequest,

    #[serde(rename = "status_response")]
    StatusResponse(StatusReport),

    #[serde(rename = "health_check")]
    HealthCheck { check_type: HealthCheckType },

    #[serde(rename = "health_response")]
    HealthResponse(HealthCheckResponse),

    #[serde(rename = "error")]
    Error { code: u32, message: String },
}

impl IpcMessage {
    /// Operation name used for spans and logs.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreatePool { .. } => "create_pool",
            Self::GrowPool { .. } => "grow_pool",
            Self::DeletePool { .. } => "delete_pool",
            Self::Allocate(_) => "allocate",
            Self::Free { .. } => "free",
            Self::ReclaimRequest { .. } => "reclaim_request",
            Self::ReclaimCancel { .. } => "reclaim_cancel",
            Self::ReclaimStatusRequest { .. } => "reclaim_status",
            Self::ResponsiveReclaim { .. } => "responsive_reclaim",
            Self::StatusRequest => "status",
            Self::HealthCheck { .. } => "health_check",
            _ => "response",
        }
    }

    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

fn lenient_requester<'de, D>(deserializer: D) -> Result<RequesterId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => {
            n.as_i64().map(RequesterId).unwrap_or(RequesterId::UNMAPPED)
        }
        Some(serde_json::Value::String(s)) => RequesterId::from_header(Some(&s)),
        _ => RequesterId::UNMAPPED,
    })
}

pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16 MB
/// Maximum response size to prevent memory exhaustion
const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Encode message to JSON bytes with size limit enforcement.
pub fn encode_message(message: &IpcMessage) -> Result<Vec<u8>, ProtocolError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(bytes)
}

/// Encode a response; oversized responses are replaced by an error message.
pub fn encode_response(message: &IpcMessage) -> Result<Vec<u8>, ProtocolError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        let error_response = IpcMessage::error(
            413,
            format!(
                "Response too large: {} bytes (max {})",
                bytes.len(),
                MAX_RESPONSE_SIZE
            ),
        );
        return encode_message(&error_response);
    }
    Ok(bytes)
}

/// Decode message from JSON bytes with size limit enforcement.
///
/// # Security
/// Size check happens BEFORE parsing to prevent allocation attacks.
pub fn decode_message(bytes: &[u8]) -> Result<IpcMessage, ProtocolError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}
