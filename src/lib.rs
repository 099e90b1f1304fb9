//! AQUA memory pool arbitration runtime.
//!
//! Tracks per-device memory pools, routes requesters to pools, grants and
//! frees allocations, and coordinates cooperative reclaim. The service only
//! does bookkeeping; it never touches device memory itself.
//!
//! # Boundaries
//!
//! - State: in-memory only, lost on restart.
//! - IPC: Named pipes/Unix sockets only. No HTTP/REST/WebSocket.
//! - Routing: fixed at startup from `AQUA_MATCH`.

pub mod cli;
pub mod config;
pub mod health;
pub mod ipc;
pub mod memory;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use ipc::{ConnectionConfig, ConnectionPool, IpcHandler, IpcHandlerConfig, IpcServerConfig};
use memory::{AllocationManager, RoutingTable};
use shutdown::ShutdownCoordinator;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub routing: RoutingTable,
    pub ipc_server: IpcServerConfig,
    pub connections: ConnectionConfig,
    pub shutdown_timeout: Duration,
    pub handler: IpcHandlerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            routing: RoutingTable::default(),
            ipc_server: IpcServerConfig::default(),
            connections: ConnectionConfig::default(),
            shutdown_timeout: Duration::from_secs(30),
            handler: IpcHandlerConfig::default(),
        }
    }
}

impl From<config::EnvConfig> for RuntimeConfig {
    fn from(env: config::EnvConfig) -> Self {
        Self {
            routing: env.routing,
            ipc_server: env.ipc_server,
            connections: env.connections,
            shutdown_timeout: env.shutdown_timeout,
            handler: IpcHandlerConfig {
                health: env.health,
                log_status: env.log_status,
            },
        }
    }
}

/// The AQUA runtime instance.
pub struct Runtime {
    pub manager: Arc<AllocationManager>,
    pub ipc_handler: Arc<IpcHandler>,
    pub connections: Arc<ConnectionPool>,
    pub shutdown: ShutdownCoordinator,
    pub config: RuntimeConfig,
}

impl Runtime {
    /// Create a new runtime instance with the given configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let manager = Arc::new(AllocationManager::new(config.routing.clone()));
        let shutdown = ShutdownCoordinator::new();
        let connections = Arc::new(ConnectionPool::new(config.connections.clone()));
        let ipc_handler = Arc::new(IpcHandler::new(
            Arc::clone(&manager),
            shutdown.clone(),
            config.handler.clone(),
        ));

        Self {
            manager,
            ipc_handler,
            connections,
            shutdown,
            config,
        }
    }
}
