//! Registry of live allocations.
//!
//! The registry itself is not synchronized; the manager keeps it behind the
//! process-wide ledger lock together with the reclaim set.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;
use super::pool::PoolId;

/// Globally unique allocation identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationId(Uuid);

impl AllocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AllocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AllocationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A granted reservation against a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub size: u64,
    pub address: String,
    pub pool_id: PoolId,
    pub allocation_id: AllocationId,
    /// Generation of the pool entry the bytes were taken from.
    #[serde(skip)]
    pub(crate) generation: u64,
}

#[derive(Debug, Default)]
pub struct AllocationRegistry {
    allocations: HashMap<AllocationId, Allocation>,
}

impl AllocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new allocation under a freshly generated id.
    pub fn insert(
        &mut self,
        size: u64,
        address: String,
        pool_id: PoolId,
        generation: u64,
    ) -> Allocation {
        let mut allocation_id = AllocationId::new();
        while self.allocations.contains_key(&allocation_id) {
            allocation_id = AllocationId::new();
        }

        let allocation = Allocation {
            size,
            address,
            pool_id,
            allocation_id,
            generation,
        };
        self.allocations.insert(allocation_id, allocation.clone());
        allocation
    }

    pub fn remove(&mut self, id: &AllocationId) -> Result<Allocation, StoreError> {
        self.allocations
            .remove(id)
            .ok_or(StoreError::AllocationNotFound(*id))
    }

    pub fn get(&self, id: &AllocationId) -> Option<&Allocation> {
        self.allocations.get(id)
    }

    /// Keep the ids (in input order) whose live record satisfies `predicate`.
    ///
    /// Unknown ids are dropped.
    pub fn filter<F>(&self, ids: &[AllocationId], predicate: F) -> Vec<AllocationId>
    where
        F: Fn(&Allocation) -> bool,
    {
        ids.iter()
            .filter(|id| self.allocations.get(*id).is_some_and(&predicate))
            .copied()
            .collect()
    }

    /// Sum of live allocation sizes on a pool.
    pub fn bytes_on(&self, pool_id: PoolId) -> u64 {
        self.allocations
            .values()
            .filter(|a| a.pool_id == pool_id)
            .map(|a| a.size)
            .sum()
    }

    pub fn count_on(&self, pool_id: PoolId) -> usize {
        self.allocations
            .values()
            .filter(|a| a.pool_id == pool_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}
