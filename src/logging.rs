// src/logging.rs

//! Logging setup for `execwatch` using `tracing` + `tracing-subscriber`.
//!
//! The CLI level applies to `execwatch` events only; other crates stay at
//! `warn`. `EXECWATCH_LOG` takes either a bare level (`debug`) with the same
//! meaning, or full `EnvFilter` directives (`execwatch::background=trace`).
//!
//! Logs are sent to STDERR so that stdout carries only captured command
//! output.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV: &str = "EXECWATCH_LOG";

const DEFAULT_DIRECTIVES: &str = "warn,execwatch=info";

/// Initialise the global logging subscriber. Fails if one is already set.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let directives = filter_directives(cli_level, env.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialising logging: {e}"))?;

    Ok(())
}

/// Filter directives for the given CLI level and `EXECWATCH_LOG` value.
///
/// Precedence: CLI flag, then the env var, then `info` for this crate.
pub fn filter_directives(cli_level: Option<LogLevel>, env: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return crate_level(level_name(lvl));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => match parse_level_str(s) {
            Some(level) => crate_level(level),
            None => s.to_string(),
        },
        None => DEFAULT_DIRECTIVES.to_string(),
    }
}

fn crate_level(level: &str) -> String {
    format!("warn,execwatch={level}")
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Normalise a bare level name; `None` for anything else.
pub fn parse_level_str(s: &str) -> Option<&'static str> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some("error"),
        "warn" | "warning" => Some("warn"),
        "info" => Some("info"),
        "debug" => Some("debug"),
        "trace" => Some("trace"),
        _ => None,
    }
}
