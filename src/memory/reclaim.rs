//! Pending-reclaim bookkeeping.
//!
//! A pool in the reclaim set is admission-blocked: the manager refuses new
//! allocations against it while existing ones stay valid until freed. The set
//! never evicts anything on its own.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::pool::PoolId;

/// Idle report for an external orchestrator deciding whether to tear a pool down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimStatus {
    pub capacity: u64,
    pub available: u64,
    /// True iff nothing is allocated from the pool.
    pub can_reclaim: bool,
}

#[derive(Debug, Default)]
pub struct ReclaimSet {
    pending: HashSet<PoolId>,
}

impl ReclaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a pool. Idempotent; always reports `true`.
    pub fn request(&mut self, pool_id: PoolId) -> bool {
        self.pending.insert(pool_id);
        true
    }

    /// Unmark a pool. Returns whether it was pending.
    pub fn cancel(&mut self, pool_id: PoolId) -> bool {
        self.pending.remove(&pool_id)
    }

    pub fn contains(&self, pool_id: PoolId) -> bool {
        self.pending.contains(&pool_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending pools sorted by id.
    pub fn pools(&self) -> Vec<PoolId> {
        let mut pools: Vec<_> = self.pending.iter().copied().collect();
        pools.sort_unstable();
        pools
    }
}
