// src/watch/pattern.rs

//! Blocking waits for a line matching a pattern in a background command's
//! output.
//!
//! Waits are event driven: each waiter keeps a cursor into the log, scans
//! only lines it has not seen yet, then sleeps on the buffer's change
//! notification. A line appended between a scan and the next sleep still
//! marks the buffer changed, so it is never skipped.

use std::time::Duration;

use regex::Regex;
use tokio::time::{Instant, timeout};
use tracing::{debug, info};

use crate::background::{BackgroundCommand, CancelReason, OutputReader, StreamState};
use crate::errors::{ExecwatchError, Result};

/// Outcome of a pattern wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// `line` matched; `observed` holds every line up to and including it.
    Matched { line: String, observed: Vec<String> },
    /// The timeout elapsed first; `partial` is what was captured by then.
    TimedOut { waited: Duration, partial: Vec<String> },
    /// The command was cancelled before a match.
    Cancelled {
        reason: CancelReason,
        partial: Vec<String>,
    },
    /// The output stream ended (process exited or failed) without a match.
    Ended {
        exit_code: Option<i32>,
        partial: Vec<String>,
    },
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    /// Lines seen by the wait: up to the match, or everything captured.
    pub fn observed(&self) -> &[String] {
        match self {
            MatchResult::Matched { observed, .. } => observed,
            MatchResult::TimedOut { partial, .. }
            | MatchResult::Cancelled { partial, .. }
            | MatchResult::Ended { partial, .. } => partial,
        }
    }

    /// Turn a non-match into the matching error kind, keeping `description`
    /// as the human-readable expectation.
    pub fn into_result(self, description: impl Into<String>) -> Result<String> {
        let description = description.into();
        match self {
            MatchResult::Matched { line, .. } => Ok(line),
            MatchResult::TimedOut { waited, partial } => Err(ExecwatchError::Timeout {
                description: format!("{description} ({} lines captured)", partial.len()),
                waited,
            }),
            MatchResult::Cancelled { reason, .. } => {
                Err(ExecwatchError::Cancelled { description, reason })
            }
            MatchResult::Ended { exit_code, .. } => Err(ExecwatchError::StreamEnded {
                description,
                exit_code,
            }),
        }
    }
}

enum Scan {
    Matched(usize),
    Pending,
    Finished(StreamState),
}

/// Wait until a stdout line of `handle` matches `pattern`, or `within`
/// elapses, or the command stops.
pub async fn watch_for(
    handle: &BackgroundCommand,
    pattern: &Regex,
    within: Duration,
) -> MatchResult {
    watch_reader(handle.subscribe(), pattern, within).await
}

/// [`watch_for`] over a bare reader.
pub async fn watch_reader(
    mut reader: OutputReader,
    pattern: &Regex,
    within: Duration,
) -> MatchResult {
    let started = Instant::now();

    match timeout(within, scan_until_match(&mut reader, pattern)).await {
        Ok(result) => result,
        Err(_) => {
            let waited = started.elapsed();
            debug!(pattern = %pattern, ?waited, "pattern wait timed out");
            MatchResult::TimedOut {
                waited,
                partial: reader.lines(),
            }
        }
    }
}

async fn scan_until_match(reader: &mut OutputReader, pattern: &Regex) -> MatchResult {
    let mut cursor = 0;
    let mut writer_gone = false;

    loop {
        let scan = reader.inspect(|log| {
            let lines = log.lines();
            if let Some(offset) = lines[cursor..].iter().position(|l| pattern.is_match(l)) {
                return Scan::Matched(cursor + offset);
            }
            cursor = lines.len();
            if log.state().is_terminal() {
                Scan::Finished(log.state().clone())
            } else {
                Scan::Pending
            }
        });

        match scan {
            Scan::Matched(idx) => {
                let mut observed = reader.lines();
                observed.truncate(idx + 1);
                let line = observed[idx].clone();
                debug!(pattern = %pattern, line = %line, index = idx, "pattern matched");
                return MatchResult::Matched { line, observed };
            }
            Scan::Finished(state) => {
                let partial = reader.lines();
                return match state {
                    StreamState::Cancelled(reason) => MatchResult::Cancelled { reason, partial },
                    StreamState::Exited(exit_code) => MatchResult::Ended { exit_code, partial },
                    StreamState::Failed(_) | StreamState::Running => MatchResult::Ended {
                        exit_code: None,
                        partial,
                    },
                };
            }
            Scan::Pending if writer_gone => {
                return MatchResult::Ended {
                    exit_code: None,
                    partial: reader.lines(),
                };
            }
            Scan::Pending => {}
        }

        if !reader.changed().await {
            writer_gone = true;
        }
    }
}

/// Block until a line of `handle` matches `pattern`.
///
/// Fails with `ExecwatchError::Timeout` after `within`, `Cancelled` if the
/// command is cancelled first, and `StreamEnded` if it exits first.
pub async fn wait_until_match(
    handle: &BackgroundCommand,
    pattern: &Regex,
    within: Duration,
) -> Result<()> {
    let description = format!(
        "waiting for /{pattern}/ in output of `{}` on {}",
        handle.command(),
        handle.target()
    );

    let line = watch_for(handle, pattern, within)
        .await
        .into_result(description)?;

    info!(handle = handle.id(), line = %line, "expected output observed");
    Ok(())
}

/// Number of stdout lines captured so far.
///
/// A snapshot: only meaningful once no more output is expected, e.g. after
/// [`BackgroundCommand::stop`].
pub fn count_lines(handle: &BackgroundCommand) -> usize {
    handle.line_count()
}

/// Number of captured stdout lines matching `pattern`.
pub fn count_matching(handle: &BackgroundCommand, pattern: &Regex) -> usize {
    handle
        .output()
        .iter()
        .filter(|line| pattern.is_match(line))
        .count()
}
