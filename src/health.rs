//! Health check support for AQUA.
//!
//! Liveness, readiness, and a full report over the allocation manager, so an
//! orchestrator can probe the service through the same IPC channel it uses
//! for leasing.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::memory::AllocationManager;
use crate::shutdown::ShutdownState;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Detailed health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub ready: bool,
    pub accepting_requests: bool,
    pub pools: usize,
    pub allocations: usize,
    pub reclaiming_pools: usize,
    pub uptime_secs: u64,
}

/// Health check configuration.
#[derive(Debug, Clone, Default)]
pub struct HealthConfig {
    /// Report not-ready until at least one pool is leased.
    pub require_pool: bool,
}

/// Aggregates health information from runtime components.
pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    /// Check liveness: process is responsive.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// Check readiness: accepting traffic.
    pub fn is_ready(&self, shutdown_state: ShutdownState, pools: usize) -> bool {
        shutdown_state == ShutdownState::Running && !(self.config.require_pool && pools == 0)
    }

    /// Generate a full report from the live manager state.
    pub fn report(&self, shutdown_state: ShutdownState, manager: &AllocationManager) -> HealthReport {
        let pools = manager.pools().len();
        let allocations = manager.allocation_count();
        let reclaiming_pools = manager.reclaiming().len();
        let ready = self.is_ready(shutdown_state, pools);

        let state = if shutdown_state != ShutdownState::Running {
            HealthState::Unhealthy
        } else if !ready {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        HealthReport {
            state,
            ready,
            accepting_requests: shutdown_state == ShutdownState::Running,
            pools,
            allocations,
            reclaiming_pools,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
