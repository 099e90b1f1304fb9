//! Connection limiting for the IPC server.
//!
//! Guards own an `Arc` of the pool so they can move into spawned connection
//! tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration for connection pool.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub max_connections: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { max_connections: 64 }
    }
}

/// Global connection pool with atomic counting.
pub struct ConnectionPool {
    active: AtomicUsize,
    config: ConnectionConfig,
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            active: AtomicUsize::new(0),
            config,
        }
    }

    /// Try to acquire a connection slot.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::Relaxed, |current| {
                (current < self.config.max_connections).then_some(current + 1)
            })
            .ok()
            .map(|_| ConnectionGuard {
                pool: Arc::clone(self),
            })
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn max_connections(&self) -> usize {
        self.config.max_connections
    }
}

/// Releases its connection slot on drop.
pub struct ConnectionGuard {
    pool: Arc<ConnectionPool>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.pool.active.fetch_sub(1, Ordering::SeqCst);
    }
}
