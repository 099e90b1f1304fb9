//! Runtime configuration loading from environment variables.
//!
//! Numeric values are loaded from `AQUA_*` variables with sensible defaults;
//! invalid numbers fall back to defaults without crashing. The routing table
//! is the exception: a missing or malformed `AQUA_MATCH` is fatal.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `AQUA_MATCH` | required | Routing table, `src:dst,src:dst` |
//! | `AQUA_SOCKET_PATH` | platform default | IPC socket / pipe path |
//! | `AQUA_IPC_FRAME_LIMIT` | 16777216 | Max IPC frame size (bytes), 4 KiB to 16 MiB |
//! | `AQUA_MAX_CONNECTIONS` | 64 | Max concurrent IPC connections |
//! | `AQUA_SHUTDOWN_TIMEOUT` | 30 | Graceful shutdown timeout (secs) |
//! | `AQUA_LOG_FORMAT` | json | `json` or `pretty` |
//! | `AQUA_LOG` | info | Log filter directive |
//! | `AQUA_LOG_FILE` | unset | Write logs to this file instead of stderr |
//! | `AQUA_LOG_STATUS` | false | Log the pool table after each mutation |
//! | `AQUA_REQUIRE_POOL` | false | Report not-ready until a pool is leased |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cli::DEFAULT_SOCKET_PATH;
use crate::health::HealthConfig;
use crate::ipc::protocol::MAX_MESSAGE_SIZE;
use crate::ipc::{ConnectionConfig, IpcServerConfig};
use crate::memory::{RoutingError, RoutingTable};
use crate::telemetry::{LogConfig, LogFormat};

pub const MATCH_ENV: &str = "AQUA_MATCH";

const DEFAULT_FRAME: usize = MAX_MESSAGE_SIZE;
const MIN_FRAME: usize = 4096; // floor: 4 KiB

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AQUA_MATCH not found in environment variables. Format = src:dst,src:dst")]
    MissingRouting,

    #[error("AQUA_MATCH is malformed: {0}")]
    InvalidRouting(#[from] RoutingError),
}

/// Effective configuration summary for `config show`.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub routes: usize,
    pub socket_path: String,
    pub ipc_frame_limit: usize,
    pub max_connections: usize,
    pub shutdown_timeout_secs: u64,
    pub log_format: &'static str,
    pub log_level: String,
    pub log_file: Option<String>,
    pub log_status: bool,
    pub require_pool: bool,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub routing: RoutingTable,
    pub socket_path: String,
    pub ipc_server: IpcServerConfig,
    pub connections: ConnectionConfig,
    pub shutdown_timeout: Duration,
    pub log: LogConfig,
    pub log_status: bool,
    pub health: HealthConfig,
}

/// Load all configuration from the process environment.
pub fn load() -> Result<EnvConfig, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_with<F>(lookup: F) -> Result<EnvConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let routing_spec = lookup(MATCH_ENV).ok_or(ConfigError::MissingRouting)?;
    let routing = RoutingTable::parse(&routing_spec)?;

    let socket_path = lookup("AQUA_SOCKET_PATH").unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_string());

    // Frames above the decoder's limit would be read in full and then refused.
    let max_frame_size =
        parse_or(&lookup, "AQUA_IPC_FRAME_LIMIT", DEFAULT_FRAME).clamp(MIN_FRAME, MAX_MESSAGE_SIZE);
    let max_connections = parse_or(&lookup, "AQUA_MAX_CONNECTIONS", 64usize).max(1);
    let shutdown_secs = parse_or(&lookup, "AQUA_SHUTDOWN_TIMEOUT", 30u64).max(1);
    let log_status = parse_or(&lookup, "AQUA_LOG_STATUS", false);
    let require_pool = parse_or(&lookup, "AQUA_REQUIRE_POOL", false);

    let log = LogConfig {
        format: lookup("AQUA_LOG_FORMAT")
            .and_then(|v| v.parse::<LogFormat>().ok())
            .unwrap_or_default(),
        level: lookup("AQUA_LOG").unwrap_or_else(|| "info".to_string()),
        output_path: lookup("AQUA_LOG_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from),
    };

    Ok(EnvConfig {
        routing,
        socket_path,
        ipc_server: IpcServerConfig { max_frame_size },
        connections: ConnectionConfig { max_connections },
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        log,
        log_status,
        health: HealthConfig { require_pool },
    })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl EnvConfig {
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            routes: self.routing.len(),
            socket_path: self.socket_path.clone(),
            ipc_frame_limit: self.ipc_server.max_frame_size,
            max_connections: self.connections.max_connections,
            shutdown_timeout_secs: self.shutdown_timeout.as_secs(),
            log_format: self.log.format.as_str(),
            log_level: self.log.level.clone(),
            log_file: self
                .log
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
            log_status: self.log_status,
            require_pool: self.health.require_pool,
        }
    }
}
