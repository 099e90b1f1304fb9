//! Graceful shutdown coordination.
//!
//! The server stops accepting frames once draining starts and waits for
//! in-flight requests to finish before exit. Allocations granted before the
//! drain stay live; nothing is freed on shutdown.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

impl ShutdownState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Result of a shutdown operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout { remaining: usize },
}

struct Inner {
    state: AtomicU8,
    in_flight: AtomicUsize,
    drained: Notify,
}

/// Coordinates graceful shutdown across the server and its connections.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(0),
                in_flight: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    pub fn is_accepting(&self) -> bool {
        self.state() == ShutdownState::Running
    }

    /// Track an in-flight request. Returns None once draining has started.
    pub fn track(&self) -> Option<ShutdownGuard> {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        if !self.is_accepting() {
            self.release();
            return None;
        }
        Some(ShutdownGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting, then wait up to `timeout` for in-flight work to drain.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        self.inner.state.store(1, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + timeout;

        let result = loop {
            let notified = self.inner.drained.notified();
            let count = self.in_flight_count();
            if count == 0 {
                break ShutdownResult::Complete;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let remaining = self.in_flight_count();
                break if remaining == 0 {
                    ShutdownResult::Complete
                } else {
                    ShutdownResult::Timeout { remaining }
                };
            }
        };

        self.inner.state.store(2, Ordering::SeqCst);
        result
    }

    fn release(&self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for in-flight request tracking.
pub struct ShutdownGuard {
    inner: Arc<Inner>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}
