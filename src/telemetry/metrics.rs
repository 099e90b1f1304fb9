//! Metrics emitted through the `metrics` crate facade.
//!
//! Without an installed recorder every call is a no-op, so the manager can
//! record unconditionally.

use metrics::{counter, gauge};

use crate::memory::{PoolId, PoolSnapshot};

/// Count an allocation attempt by outcome label.
pub fn record_allocation(outcome: &'static str) {
    counter!("aqua_allocations_total", "outcome" => outcome).increment(1);
}

/// Count a free, split by whether the bytes went back to a live pool.
pub fn record_free(released: bool) {
    let result = if released { "released" } else { "orphaned" };
    counter!("aqua_frees_total", "result" => result).increment(1);
}

/// Publish capacity gauges for one pool.
pub fn record_pool_state(pool: &PoolSnapshot) {
    let id = pool.id.to_string();
    gauge!("aqua_pool_capacity_bytes", "pool" => id.clone()).set(pool.capacity as f64);
    gauge!("aqua_pool_allocated_bytes", "pool" => id).set(pool.allocated as f64);
}

/// Zero the gauges of a deleted pool.
pub fn forget_pool(id: PoolId) {
    let id = id.to_string();
    gauge!("aqua_pool_capacity_bytes", "pool" => id.clone()).set(0.0);
    gauge!("aqua_pool_allocated_bytes", "pool" => id).set(0.0);
}

pub fn record_reclaiming(pending: usize) {
    gauge!("aqua_reclaiming_pools").set(pending as f64);
}
