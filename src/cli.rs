// src/cli.rs

//! CLI argument parsing using `clap`.

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::{ExecutorKind, Target, parse_duration};

/// Command-line arguments for `execwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "execwatch",
    version,
    about = "Run background commands on a target, wait for matching output, poll for readiness.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). A missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = "Execwatch.toml", global = true)]
    pub config: String,

    /// Override `[executor].kind` ("local" or "kubectl").
    #[arg(long, value_name = "KIND", global = true)]
    pub executor: Option<ExecutorKind>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXECWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a one-shot command and exit with its status.
    Exec {
        /// `namespace/name[:container]`.
        #[arg(long)]
        target: Target,

        #[arg(long)]
        cmd: String,
    },

    /// Re-run a one-shot command until it succeeds.
    Poll {
        #[arg(long)]
        target: Target,

        #[arg(long)]
        cmd: String,

        /// Overall bound (default: `[timeouts].helper`).
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Pause between attempts (default: `[timeouts].poll_interval`).
        #[arg(long, value_parser = parse_duration)]
        interval: Option<Duration>,

        /// Human-readable description used in the timeout message.
        #[arg(long)]
        description: Option<String>,
    },

    /// Start a background command and wait for a line matching a pattern.
    Watch {
        #[arg(long)]
        target: Target,

        #[arg(long)]
        cmd: String,

        /// Regex a stdout line must match.
        #[arg(long)]
        pattern: String,

        /// Bound for the wait (default: `[timeouts].mid`).
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// One-shot command to run once the watch is running.
        #[arg(long)]
        trigger: Option<String>,

        /// Where to run `--trigger` (default: the watched target).
        #[arg(long, requires = "trigger")]
        trigger_target: Option<Target>,

        /// Fail unless exactly this many lines were captured.
        #[arg(long, value_name = "N")]
        expect_count: Option<usize>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
