// Copyright 2024-2026 AQUA Contributors
// Licensed under the Apache License, Version 2.0

//! Allocation manager: the single entry point for pool, allocation and
//! reclaim operations.
//!
//! # Locking
//!
//! - Each pool has its own `parking_lot::Mutex` guarding only its capacity
//!   fields. Pools live in a `DashMap`, so traffic on different pools does not
//!   serialize on one map lock.
//! - One ledger mutex guards the allocation registry and the reclaim set
//!   together.
//! - Lock order is pool -> ledger. No path holds the ledger while acquiring a
//!   pool lock.
//!
//! The reclaim check runs twice during `allocate`: once as a fast reject and
//! again under the ledger lock while the pool lock is held, so a reclaim mark
//! is ordered strictly before or after every grant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::StoreError;
use super::pool::{MemoryStore, PoolId, PoolSnapshot};
use super::reclaim::{ReclaimSet, ReclaimStatus};
use super::registry::{Allocation, AllocationId, AllocationRegistry};
use super::routing::{RequesterId, RoutingTable};
use crate::telemetry;

/// Result of an allocation attempt that reached a pool decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocateOutcome {
    Granted(Allocation),
    /// The pool exists but cannot satisfy the request right now.
    InsufficientCapacity { requested: u64, available: u64 },
    /// The pool is pending reclaim and admits no new allocations.
    ReclaimBlocked(PoolId),
}

impl AllocateOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The "allocation or null" view used on the wire.
    pub fn into_allocation(self) -> Option<Allocation> {
        match self {
            Self::Granted(allocation) => Some(allocation),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Granted(_) => "granted",
            Self::InsufficientCapacity { .. } => "insufficient_capacity",
            Self::ReclaimBlocked(_) => "reclaim_blocked",
        }
    }
}

struct PoolSlot {
    generation: u64,
    store: Mutex<MemoryStore>,
}

#[derive(Default)]
struct Ledger {
    allocations: AllocationRegistry,
    reclaim: ReclaimSet,
}

/// Process-wide arbiter of pool capacity.
pub struct AllocationManager {
    routing: RoutingTable,
    pools: DashMap<PoolId, Arc<PoolSlot>>,
    ledger: Mutex<Ledger>,
    next_generation: AtomicU64,
}

impl AllocationManager {
    pub fn new(routing: RoutingTable) -> Self {
        Self {
            routing,
            pools: DashMap::new(),
            ledger: Mutex::new(Ledger::default()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    // -- Pools -----------------------------------------------------------------

    /// Lease a new pool.
    pub fn add_pool(
        &self,
        id: PoolId,
        capacity: u64,
        address: impl Into<String>,
    ) -> Result<PoolSnapshot, StoreError> {
        let store = MemoryStore::new(capacity, address);
        let snapshot = store.snapshot(id);

        match self.pools.entry(id) {
            Entry::Occupied(_) => return Err(StoreError::AlreadyExists(id)),
            Entry::Vacant(vacant) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Arc::new(PoolSlot {
                    generation,
                    store: Mutex::new(store),
                }));
            }
        }

        info!(pool_id = id, capacity, address = %snapshot.address, "Pool leased");
        telemetry::record_pool_state(&snapshot);
        Ok(snapshot)
    }

    /// Grow an existing pool by `delta` bytes.
    pub fn update_pool(&self, id: PoolId, delta: u64) -> Result<PoolSnapshot, StoreError> {
        let slot = self.slot(id)?;
        let snapshot = {
            let mut store = slot.store.lock();
            store.add_capacity(delta);
            store.snapshot(id)
        };

        info!(pool_id = id, delta, capacity = snapshot.capacity, "Pool grown");
        telemetry::record_pool_state(&snapshot);
        Ok(snapshot)
    }

    /// Remove a pool. Live allocations against it are not checked.
    pub fn delete_pool(&self, id: PoolId) -> bool {
        let existed = self.pools.remove(&id).is_some();
        if existed {
            info!(pool_id = id, "Pool deleted");
            telemetry::forget_pool(id);
        }
        existed
    }

    pub fn pool(&self, id: PoolId) -> Option<PoolSnapshot> {
        let slot = self.slot(id).ok()?;
        let snapshot = slot.store.lock().snapshot(id);
        Some(snapshot)
    }

    /// Snapshots of every pool, sorted by id.
    pub fn pools(&self) -> Vec<PoolSnapshot> {
        let slots: Vec<(PoolId, Arc<PoolSlot>)> = self
            .pools
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut snapshots: Vec<PoolSnapshot> = slots
            .into_iter()
            .map(|(id, slot)| slot.store.lock().snapshot(id))
            .collect();
        snapshots.sort_unstable_by_key(|s| s.id);
        snapshots
    }

    // -- Allocations -----------------------------------------------------------

    /// Allocate `size` bytes from the pool routed to `requester`.
    pub fn allocate(
        &self,
        size: u64,
        requester: RequesterId,
    ) -> Result<AllocateOutcome, StoreError> {
        let pool_id = self.routing.resolve(requester)?;

        if self.ledger.lock().reclaim.contains(pool_id) {
            return Ok(self.rejected(AllocateOutcome::ReclaimBlocked(pool_id), size));
        }

        let slot = self.slot(pool_id)?;
        let (outcome, granted_snapshot) = self.grant_from(pool_id, &slot, size);

        match (&outcome, granted_snapshot) {
            (AllocateOutcome::Granted(allocation), Some(snapshot)) => {
                debug!(
                    pool_id,
                    size,
                    requester = requester.0,
                    allocation_id = %allocation.allocation_id,
                    "Allocation granted"
                );
                telemetry::record_allocation(outcome.label());
                telemetry::record_pool_state(&snapshot);
                Ok(outcome)
            }
            _ => Ok(self.rejected(outcome, size)),
        }
    }

    /// Free an allocation and return its bytes to the owning pool.
    ///
    /// Returns `false` when the owning pool was deleted or re-leased since the
    /// grant; in that case no pool is touched.
    pub fn free(&self, id: &AllocationId) -> Result<bool, StoreError> {
        let allocation = self.ledger.lock().allocations.remove(id)?;
        let pool_id = allocation.pool_id;

        let slot = match self.slot(pool_id) {
            Ok(slot) if slot.generation == allocation.generation => slot,
            _ => {
                warn!(
                    pool_id,
                    allocation_id = %id,
                    "Owning pool no longer exists, allocation dropped"
                );
                telemetry::record_free(false);
                return Ok(false);
            }
        };

        let (released, over_free, snapshot) = {
            let mut store = slot.store.lock();
            let over_free = store.would_over_free(allocation.size);
            let released = store.free(allocation.size);
            (released, over_free, store.snapshot(pool_id))
        };

        if over_free {
            warn!(pool_id, size = allocation.size, "Over-free ignored");
        }
        debug!(pool_id, size = allocation.size, allocation_id = %id, "Allocation freed");

        let freed = released == allocation.size;
        telemetry::record_free(freed);
        telemetry::record_pool_state(&snapshot);
        Ok(freed)
    }

    pub fn allocation(&self, id: &AllocationId) -> Option<Allocation> {
        self.ledger.lock().allocations.get(id).cloned()
    }

    pub fn allocation_count(&self) -> usize {
        self.ledger.lock().allocations.len()
    }

    /// Bytes held by live allocations on a pool, according to the registry.
    pub fn live_bytes(&self, pool_id: PoolId) -> u64 {
        self.ledger.lock().allocations.bytes_on(pool_id)
    }

    // -- Reclaim ---------------------------------------------------------------

    /// Mark a pool pending reclaim. Idempotent, always `true`.
    pub fn request_reclaim(&self, pool_id: PoolId) -> bool {
        let (added, pending) = {
            let mut ledger = self.ledger.lock();
            (ledger.reclaim.request(pool_id), ledger.reclaim.len())
        };
        info!(pool_id, "Reclaim requested");
        telemetry::record_reclaiming(pending);
        added
    }

    /// Clear a pending reclaim. No-op if the pool was not marked.
    pub fn cancel_reclaim(&self, pool_id: PoolId) {
        let (removed, pending) = {
            let mut ledger = self.ledger.lock();
            (ledger.reclaim.cancel(pool_id), ledger.reclaim.len())
        };
        if removed {
            info!(pool_id, "Reclaim cancelled");
        }
        telemetry::record_reclaiming(pending);
    }

    pub fn is_reclaiming(&self, pool_id: PoolId) -> bool {
        self.ledger.lock().reclaim.contains(pool_id)
    }

    /// Pools currently pending reclaim, sorted by id.
    pub fn reclaiming(&self) -> Vec<PoolId> {
        self.ledger.lock().reclaim.pools()
    }

    pub fn reclaim_status(&self, pool_id: PoolId) -> Result<ReclaimStatus, StoreError> {
        let slot = self.slot(pool_id)?;
        let store = slot.store.lock();
        Ok(ReclaimStatus {
            capacity: store.capacity(),
            available: store.available(),
            can_reclaim: store.is_idle(),
        })
    }

    /// The subset of `ids` whose owning pool is pending reclaim.
    pub fn responsive_reclaim(&self, ids: &[AllocationId]) -> Vec<AllocationId> {
        let ledger = self.ledger.lock();
        ledger
            .allocations
            .filter(ids, |allocation| ledger.reclaim.contains(allocation.pool_id))
    }

    // -- Diagnostics -----------------------------------------------------------

    /// Emit one structured event per pool.
    pub fn log_status(&self) {
        for pool in self.pools() {
            info!(
                pool_id = pool.id,
                capacity = pool.capacity,
                allocated = pool.allocated,
                available = pool.available,
                "Pool status"
            );
        }
    }

    fn slot(&self, id: PoolId) -> Result<Arc<PoolSlot>, StoreError> {
        self.pools
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::PoolNotFound(id))
    }

    /// Grant against one pool entry. A granted outcome comes with the
    /// entry's snapshot, taken before the pool lock is released.
    fn grant_from(
        &self,
        pool_id: PoolId,
        slot: &PoolSlot,
        size: u64,
    ) -> (AllocateOutcome, Option<PoolSnapshot>) {
        let mut store = slot.store.lock();
        let available = store.available();
        if available < size {
            let outcome = AllocateOutcome::InsufficientCapacity {
                requested: size,
                available,
            };
            return (outcome, None);
        }

        let mut ledger = self.ledger.lock();
        if ledger.reclaim.contains(pool_id) {
            return (AllocateOutcome::ReclaimBlocked(pool_id), None);
        }

        store.malloc(size);
        let allocation = ledger.allocations.insert(
            size,
            store.address().to_string(),
            pool_id,
            slot.generation,
        );
        (
            AllocateOutcome::Granted(allocation),
            Some(store.snapshot(pool_id)),
        )
    }

    fn rejected(&self, outcome: AllocateOutcome, size: u64) -> AllocateOutcome {
        debug!(size, outcome = outcome.label(), "Allocation rejected");
        telemetry::record_allocation(outcome.label());
        outcome
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
