// src/lib.rs

pub mod background;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod poll;
pub mod readiness;
pub mod types;
pub mod watch;
pub mod workload;

use std::time::Duration;

use anyhow::{Result, bail};
use regex::Regex;
use tracing::{info, warn};

use crate::background::{BackgroundCommand, CancelReason, CommandScope};
use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_or_default};
use crate::errors::ExecwatchError;
use crate::exec::{RemoteExecutor, executor_from_config};
use crate::poll::TimeoutConfig;
use crate::readiness::wait_until_ready;
use crate::types::Target;
use crate::watch::{count_lines, wait_until_match};

pub use crate::background::{OutputLog, StreamState};
pub use crate::poll::{poll, poll_fallible};
pub use crate::watch::MatchResult;

/// High-level entry point used by `main.rs`.
///
/// Loads the config, builds the executor it selects, and runs the requested
/// subcommand. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let mut cfg = load_or_default(&args.config)?;
    if let Some(kind) = args.executor {
        cfg.executor.kind = kind;
    }

    let executor = executor_from_config(&cfg.executor);

    match args.command {
        Command::Exec { target, cmd } => run_exec(executor.as_ref(), &target, &cmd).await,
        Command::Poll {
            target,
            cmd,
            timeout,
            interval,
            description,
        } => {
            let config = TimeoutConfig::new(timeout.unwrap_or(cfg.timeouts.helper))
                .with_interval(interval.unwrap_or(cfg.timeouts.poll_interval))
                .with_attempt_timeout(cfg.timeouts.short);
            let description =
                description.unwrap_or_else(|| format!("`{cmd}` to succeed on {target}"));

            wait_until_ready(executor.as_ref(), &target, &cmd, &description, &config).await?;
            println!("ready");
            Ok(0)
        }
        Command::Watch {
            target,
            cmd,
            pattern,
            timeout,
            trigger,
            trigger_target,
            expect_count,
        } => {
            let request = WatchRequest {
                target,
                cmd,
                pattern: Regex::new(&pattern).map_err(ExecwatchError::from)?,
                within: timeout.unwrap_or(cfg.timeouts.mid),
                trigger,
                trigger_target,
                expect_count,
            };
            run_watch(executor.as_ref(), &cfg, request).await
        }
    }
}

async fn run_exec(executor: &dyn RemoteExecutor, target: &Target, cmd: &str) -> Result<i32> {
    let res = executor.run_sync(target, cmd).await?;
    print!("{}", res.stdout);
    eprint!("{}", res.stderr);
    Ok(res.exit_code.unwrap_or(1))
}

struct WatchRequest {
    target: Target,
    cmd: String,
    pattern: Regex,
    within: Duration,
    trigger: Option<String>,
    trigger_target: Option<Target>,
    expect_count: Option<usize>,
}

/// Start the background command, fire the optional trigger, wait for the
/// pattern, then stop the command and print everything it captured.
async fn run_watch(
    executor: &dyn RemoteExecutor,
    cfg: &ConfigFile,
    req: WatchRequest,
) -> Result<i32> {
    let grace = cfg.timeouts.grace_period;
    let scope = CommandScope::with_deadline(req.within + grace).grace_period(grace);

    let handle = BackgroundCommand::start(executor, req.target, req.cmd, &scope).await?;

    if let Some(trigger) = &req.trigger {
        let trigger_target = req
            .trigger_target
            .clone()
            .unwrap_or_else(|| handle.target().clone());
        info!(target = %trigger_target, cmd = %trigger, "running trigger");

        let res = executor.run_sync(&trigger_target, trigger).await?;
        if !res.was_successful() {
            scope.close().await;
            return Err(ExecwatchError::Command {
                command: trigger.clone(),
                exit_code: res.exit_code,
                stderr: res.stderr.trim().to_string(),
            }
            .into());
        }
    }

    let outcome = tokio::select! {
        res = wait_until_match(&handle, &req.pattern, req.within) => res,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; stopping background command");
            Err(ExecwatchError::Cancelled {
                description: format!("waiting for /{}/", req.pattern),
                reason: CancelReason::Requested,
            })
        }
    };

    let state = handle.stop().await;
    info!(handle = handle.id(), ?state, "background command stopped");
    for line in handle.output() {
        println!("{line}");
    }
    scope.close().await;

    outcome?;

    if let Some(expected) = req.expect_count {
        let got = count_lines(&handle);
        if got != expected {
            bail!("expected exactly {expected} captured lines, got {got}");
        }
    }

    Ok(0)
}
