// Copyright 2024-2026 AQUA Contributors
// SPDX-License-Identifier: Apache-2.0

//! `status` subcommand: prints the pool table of a running server.

use crate::ipc::StatusReport;

use super::ipc_client::CliIpcClient;

/// Fetch and print server status. Returns the process exit code.
pub async fn run_status(socket_path: &str, json: bool) -> i32 {
    let client = CliIpcClient::new(socket_path.to_string());
    let report = match client.status().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Status request failed: {}", e);
            return e.exit_code();
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to render status: {}", e);
                return 1;
            }
        }
    } else {
        print!("{}", render_table(&report));
    }
    0
}

/// Render the report as a fixed-width table.
pub fn render_table(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>6} {:>16} {:>16} {:>16} {:>6}  {:<9} {}\n",
        "POOL", "CAPACITY", "ALLOCATED", "AVAILABLE", "USE%", "RECLAIM", "ADDRESS"
    ));
    for pool in &report.pools {
        let reclaim = if report.reclaiming.contains(&pool.id) {
            "pending"
        } else {
            "-"
        };
        out.push_str(&format!(
            "{:>6} {:>16} {:>16} {:>16} {:>5.1}%  {:<9} {}\n",
            pool.id,
            pool.capacity,
            pool.allocated,
            pool.available,
            pool.utilization() * 100.0,
            reclaim,
            pool.address
        ));
    }
    out.push_str(&format!(
        "{} pool(s), {} live allocation(s)\n",
        report.pools.len(),
        report.allocations
    ));
    out
}
