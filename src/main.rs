//! AQUA runtime entry point.
//!
//! Bootstraps the pool arbitration service with:
//! - Configuration loading (fatal on a bad routing table)
//! - Structured logging
//! - IPC listener setup
//! - Signal handling for graceful shutdown
//!
//! ## CLI Subcommands
//!
//! - `aqua-serve` or `aqua-serve serve` - Run IPC server (default)
//! - `aqua-serve health` - Full health check (exit 0/1)
//! - `aqua-serve live` - Liveness probe (exit 0/1)
//! - `aqua-serve ready` - Readiness probe (exit 0/1)
//! - `aqua-serve status [--json]` - Pool table of a running server

use std::process::ExitCode;
use std::sync::Arc;

use aqua_core::cli::{get_socket_path, run_health, run_liveness, run_readiness, run_status};
use aqua_core::config as aqua_config;
use aqua_core::ipc::server;
use aqua_core::shutdown::ShutdownResult;
use aqua_core::telemetry::init_logging;
use aqua_core::{Runtime, RuntimeConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" | "" => serve().await,
        "health" => exit(run_health(&get_socket_path()).await),
        "live" | "liveness" => exit(run_liveness(&get_socket_path()).await),
        "ready" | "readiness" => exit(run_readiness(&get_socket_path()).await),
        "status" => {
            let json_output = args.get(2).map(|s| s.as_str()) == Some("--json");
            exit(run_status(&get_socket_path(), json_output).await)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => exit(aqua_core::cli::config_cmd::run_show()),
                "validate" => exit(aqua_core::cli::config_cmd::run_validate()),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_usage();
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("aqua-serve {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn print_usage() {
    eprintln!(
        "aqua-serve - GPU memory pool arbitration service v{}

USAGE:
    aqua-serve [COMMAND] [OPTIONS]

COMMANDS:
    serve            Run the IPC server (default when no command given)
    health           Full health check (exit 0 if healthy, 1 if unhealthy)
    live             Liveness probe (exit 0 if alive)
    ready            Readiness probe (exit 0 if ready)
    status [--json]  Show pools, utilization and reclaim state
    config show      Print the effective configuration
    config validate  Check the configuration for mistakes
    version          Show version information
    help             Show this help message

ENVIRONMENT:
    AQUA_MATCH             Routing table, src:dst,src:dst (required for serve)
    AQUA_SOCKET_PATH       IPC socket path (default: /var/run/aqua/aqua.sock on Unix)
    AQUA_IPC_FRAME_LIMIT   Max request frame size in bytes
    AQUA_MAX_CONNECTIONS   Max concurrent IPC connections
    AQUA_SHUTDOWN_TIMEOUT  Drain timeout in seconds
    AQUA_LOG_FORMAT        json or pretty
    AQUA_LOG               Log filter (e.g. info, aqua_core=debug)
    AQUA_LOG_STATUS        Log the pool table after each mutation

EXIT CODES:
    0  Success / Healthy
    1  Failure / Unhealthy
    2  Configuration error
    3  Connection error
",
        env!("CARGO_PKG_VERSION")
    );
}

async fn serve() -> ExitCode {
    let env = match aqua_config::load() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2u8);
        }
    };

    if let Err(e) = init_logging(&env.log) {
        eprintln!("Logging setup failed: {}", e);
        return ExitCode::from(2u8);
    }

    info!(
        routes = env.routing.len(),
        socket = %env.socket_path,
        "Starting AQUA"
    );
    for (requester, pool) in env.routing.routes() {
        info!(requester = %requester, pool, "Route");
    }

    let socket_path = env.socket_path.clone();
    let runtime = Runtime::new(RuntimeConfig::from(env));
    match run_ipc_server(runtime, socket_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

async fn run_ipc_server(
    runtime: Runtime,
    socket_path: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let handler = Arc::clone(&runtime.ipc_handler);
    let connections = Arc::clone(&runtime.connections);
    let shutdown = runtime.shutdown.clone();
    let shutdown_timeout = runtime.config.shutdown_timeout;
    let ipc_config = runtime.config.ipc_server.clone();

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let mut server_handle = tokio::spawn(server::run_server(
        socket_path,
        handler,
        connections,
        shutdown.clone(),
        stop_rx,
        ipc_config,
    ));

    // Wait for Ctrl+C, or for the listener to die on its own.
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, draining");
        }
        finished = &mut server_handle => {
            finished??;
            return Ok(());
        }
    }

    let _ = stop_tx.send(true);

    match shutdown.initiate(shutdown_timeout).await {
        ShutdownResult::Complete => info!("Shutdown complete"),
        ShutdownResult::Timeout { remaining } => {
            warn!(remaining, "Shutdown timeout, requests still in flight");
        }
    }
    runtime.manager.log_status();

    server_handle.await??;
    Ok(())
}
