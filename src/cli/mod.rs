// Copyright 2024-2026 AQUA Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for AQUA runtime commands.
//!
//! Probes and inspects a running server through the same IPC socket that
//! leasing clients use.
//!
//! ## Usage
//!
//! ```bash
//! aqua-serve health          # Full health check, exits 0 on healthy
//! aqua-serve live            # Liveness probe, exits 0 if alive
//! aqua-serve ready           # Readiness probe, exits 0 if ready
//! aqua-serve status          # Show pools and reclaim state
//! aqua-serve config show     # Print effective configuration
//! ```

pub mod config_cmd;
pub mod health;
pub mod ipc_client;
pub mod status;

pub use health::{run_health, run_liveness, run_readiness};
pub use ipc_client::{CliError, CliIpcClient};
pub use status::run_status;

/// Default socket path for IPC communication.
#[cfg(unix)]
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/aqua/aqua.sock";

#[cfg(windows)]
pub const DEFAULT_SOCKET_PATH: &str = r"\\.\pipe\aqua";

/// Environment variable overriding the socket path.
pub const SOCKET_PATH_ENV: &str = "AQUA_SOCKET_PATH";

/// Get socket path from environment or use default.
pub fn get_socket_path() -> String {
    std::env::var(SOCKET_PATH_ENV).unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string())
}
