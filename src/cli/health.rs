//! Health probe subcommands.
//!
//! Exit codes: 0 healthy, 1 unhealthy, 3 connection error.

use crate::ipc::HealthCheckType;

use super::ipc_client::CliIpcClient;

pub async fn run_health(socket_path: &str) -> i32 {
    probe(socket_path, HealthCheckType::Full).await
}

pub async fn run_liveness(socket_path: &str) -> i32 {
    probe(socket_path, HealthCheckType::Liveness).await
}

pub async fn run_readiness(socket_path: &str) -> i32 {
    probe(socket_path, HealthCheckType::Readiness).await
}

async fn probe(socket_path: &str, check_type: HealthCheckType) -> i32 {
    let client = CliIpcClient::new(socket_path.to_string());
    match client.health(check_type).await {
        Ok(response) => {
            if let Some(report) = &response.report {
                println!(
                    "state={:?} pools={} allocations={} reclaiming={} uptime={}s",
                    report.state,
                    report.pools,
                    report.allocations,
                    report.reclaiming_pools,
                    report.uptime_secs
                );
            }
            if response.ok {
                println!("{:?}: OK", check_type);
                0
            } else {
                eprintln!("{:?}: FAILED", check_type);
                1
            }
        }
        Err(e) => {
            eprintln!("Health check failed: {}", e);
            e.exit_code()
        }
    }
}
