//! Memory arbitration for AQUA.
//!
//! Pools, the static routing table, the allocation registry, reclaim
//! bookkeeping, and the manager that ties them together.

mod error;
mod manager;
mod pool;
mod reclaim;
mod registry;
mod routing;

pub use error::StoreError;
pub use manager::{AllocateOutcome, AllocationManager};
pub use pool::{MemoryStore, PoolId, PoolSnapshot};
pub use reclaim::{ReclaimSet, ReclaimStatus};
pub use registry::{Allocation, AllocationId, AllocationRegistry};
pub use routing::{RequesterId, RoutingError, RoutingTable};
