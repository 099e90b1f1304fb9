// Copyright 2024-2026 AQUA Contributors
// Licensed under the Apache License, Version 2.0

//! Capacity accounting for a single leased memory region.
//!
//! A `MemoryStore` never blocks and never locks; the manager wraps each one in
//! a `parking_lot::Mutex` and is the only writer.

use serde::{Deserialize, Serialize};

/// Externally supplied pool identifier.
pub type PoolId = i64;

/// One physical memory region offered to the arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    capacity: u64,
    allocated: u64,
    address: String,
}

impl MemoryStore {
    pub fn new(capacity: u64, address: impl Into<String>) -> Self {
        Self {
            capacity,
            allocated: 0,
            address: address.into(),
        }
    }

    /// Grant `size` bytes, all or nothing.
    ///
    /// Returns the granted amount: `size` on success, 0 when the request does
    /// not fit (state is left untouched).
    pub fn malloc(&mut self, size: u64) -> u64 {
        if self.available() < size {
            return 0;
        }
        self.allocated += size;
        size
    }

    /// Release `size` bytes.
    ///
    /// An over-free (more than is allocated) reports `size` as released but
    /// does not mutate the store.
    pub fn free(&mut self, size: u64) -> u64 {
        if self.allocated >= size {
            self.allocated -= size;
        }
        size
    }

    /// Grow the region after a re-lease.
    pub fn add_capacity(&mut self, delta: u64) {
        self.capacity = self.capacity.saturating_add(delta);
    }

    pub fn available(&self) -> u64 {
        self.capacity - self.allocated
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// True when nothing is granted against this store.
    pub fn is_idle(&self) -> bool {
        self.allocated == 0
    }

    /// Whether an over-free of `size` would be silently ignored.
    pub fn would_over_free(&self, size: u64) -> bool {
        self.allocated < size
    }

    pub fn snapshot(&self, id: PoolId) -> PoolSnapshot {
        PoolSnapshot {
            id,
            capacity: self.capacity,
            allocated: self.allocated,
            available: self.available(),
            address: self.address.clone(),
        }
    }
}

/// Point-in-time view of a pool, safe to hand out past the pool lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub id: PoolId,
    pub capacity: u64,
    pub allocated: u64,
    pub available: u64,
    pub address: String,
}

impl PoolSnapshot {
    /// Fraction of capacity currently granted.
    pub fn utilization(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.allocated as f32 / self.capacity as f32
    }
}
