// Copyright 2024-2026 AQUA Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, validate.
//!
//! These commands read configuration directly from environment variables
//! without requiring an IPC connection to a running server.

use crate::config::{self, EffectiveConfig, EnvConfig};

/// Print effective config as key-value pairs to stdout.
///
/// Returns 0 on success, 2 if the configuration cannot be loaded.
pub fn run_show() -> i32 {
    match config::load() {
        Ok(env) => {
            print!("{}", render_config(&env.effective_config()));
            print!("{}", render_routes(&env));
            0
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            2
        }
    }
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 on a fatal error.
pub fn run_validate() -> i32 {
    let env = match config::load() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 2;
        }
    };

    let warnings = validate(&env);
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }

    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

/// Non-fatal findings for a loaded configuration.
pub fn validate(env: &EnvConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if env.routing.is_empty() {
        warnings.push("AQUA_MATCH has no routes; every allocate will be rejected".to_string());
    }

    let routes = env.routing.routes();
    let mut targets: Vec<_> = routes.iter().map(|(_, pool)| *pool).collect();
    targets.sort_unstable();
    targets.dedup();
    if targets.len() < routes.len() {
        warnings.push(format!(
            "{} requester(s) share {} pool(s)",
            routes.len(),
            targets.len()
        ));
    }

    warnings
}

fn render_config(cfg: &EffectiveConfig) -> String {
    format!(
        "AQUA_SOCKET_PATH={}\n\
         AQUA_IPC_FRAME_LIMIT={}\n\
         AQUA_MAX_CONNECTIONS={}\n\
         AQUA_SHUTDOWN_TIMEOUT={}\n\
         AQUA_LOG_FORMAT={}\n\
         AQUA_LOG={}\n\
         AQUA_LOG_FILE={}\n\
         AQUA_LOG_STATUS={}\n\
         AQUA_REQUIRE_POOL={}\n\
         routes={}\n",
        cfg.socket_path,
        cfg.ipc_frame_limit,
        cfg.max_connections,
        cfg.shutdown_timeout_secs,
        cfg.log_format,
        cfg.log_level,
        cfg.log_file.as_deref().unwrap_or("stderr"),
        cfg.log_status,
        cfg.require_pool,
        cfg.routes,
    )
}

fn render_routes(env: &EnvConfig) -> String {
    env.routing
        .routes()
        .into_iter()
        .map(|(requester, pool)| format!("  {} -> {}\n", requester, pool))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_with;

    fn load(routing: &str) -> EnvConfig {
        let routing = routing.to_string();
        load_with(move |key| (key == config::MATCH_ENV).then(|| routing.clone())).unwrap()
    }

    #[test]
    fn test_validate_one_to_one_routing() {
        assert!(validate(&load("0:0,1:1,2:2")).is_empty());
    }

    #[test]
    fn test_validate_warns_on_shared_pool() {
        let warnings = validate(&load("0:0,1:0,2:1"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("3 requester(s) share 2 pool(s)"));
    }

    #[test]
    fn test_render_config_includes_all_fields() {
        let rendered = render_config(&load("0:0").effective_config());
        for key in [
            "AQUA_SOCKET_PATH=",
            "AQUA_IPC_FRAME_LIMIT=",
            "AQUA_MAX_CONNECTIONS=64",
            "AQUA_SHUTDOWN_TIMEOUT=30",
            "AQUA_LOG_FORMAT=json",
            "AQUA_LOG=info",
            "AQUA_LOG_FILE=stderr",
            "AQUA_LOG_STATUS=false",
            "AQUA_REQUIRE_POOL=false",
            "routes=1",
        ] {
            assert!(rendered.contains(key), "missing {}", key);
        }
    }

    #[test]
    fn test_render_routes_sorted() {
        let rendered = render_routes(&load("2:1,0:0"));
        assert_eq!(rendered, "  0 -> 0\n  2 -> 1\n");
    }
}
