//! Error types for the allocation manager.
//!
//! Capacity shortfalls and reclaim gating are expected outcomes and are
//! reported through `AllocateOutcome`, not here.

use thiserror::Error;

use super::pool::PoolId;
use super::registry::AllocationId;
use super::routing::RequesterId;

/// Errors returned by `AllocationManager` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Pool {0} already exists")]
    AlreadyExists(PoolId),

    #[error("Pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("Allocation {0} not found")]
    AllocationNotFound(AllocationId),

    /// An allocation id this service could never have issued.
    #[error("Allocation {0} not found")]
    UnknownAllocation(String),

    #[error("Requester {0} has no routing entry")]
    Unmapped(RequesterId),
}

impl StoreError {
    /// Numeric status used on the IPC wire.
    pub fn status_code(&self) -> u32 {
        match self {
            Self::AlreadyExists(_) => 409,
            Self::PoolNotFound(_) | Self::AllocationNotFound(_) | Self::UnknownAllocation(_) => {
                404
            }
            Self::Unmapped(_) => 421,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PoolNotFound(_) | Self::AllocationNotFound(_) | Self::UnknownAllocation(_)
        )
    }
}
