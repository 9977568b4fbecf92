// src/poll.rs

//! Retry-until-success-or-timeout over a probe.
//!
//! The probe is invoked immediately, then once per interval on the tokio
//! timer, with a final attempt at the deadline. A zero timeout means exactly
//! one attempt.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, warn};

use crate::errors::{ExecwatchError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Bounds for a blocking poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    timeout: Duration,
    interval: Duration,
    attempt_timeout: Option<Duration>,
    abort_on_error: bool,
}

impl TimeoutConfig {
    /// Poll for at most `timeout`, every [`DEFAULT_POLL_INTERVAL`].
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
            attempt_timeout: None,
            abort_on_error: false,
        }
    }

    /// Set the pause between attempts. A zero interval falls back to the
    /// default so a poll can never spin.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Bound every single attempt; an attempt running longer counts as
    /// failed.
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = Some(attempt_timeout);
        self
    }

    /// Treat a probe error as unrecoverable and stop polling on it.
    pub fn abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub fn aborts_on_error(&self) -> bool {
        self.abort_on_error
    }
}

enum Attempt {
    Success,
    NotYet,
    Error(anyhow::Error),
    Panicked(String),
    TimedOut(Duration),
}

/// Invoke `probe` until it returns `true`.
///
/// Fails with `ExecwatchError::Timeout` carrying `description` and the time
/// waited. A panicking probe counts as one failed attempt.
pub async fn poll<F, Fut>(description: &str, mut probe: F, config: &TimeoutConfig) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_fallible(description, || probe().map(Ok::<bool, anyhow::Error>), config).await
}

/// [`poll`] for probes that can fail.
///
/// An `Err` counts as a failed attempt, unless the config has
/// `abort_on_error` set, in which case it ends the poll with
/// `ExecwatchError::ProbeAborted`.
pub async fn poll_fallible<F, Fut>(
    description: &str,
    mut probe: F,
    config: &TimeoutConfig,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let attempt = match std::panic::catch_unwind(AssertUnwindSafe(&mut probe)) {
            Ok(fut) => run_attempt(fut, config.attempt_timeout).await,
            Err(payload) => Attempt::Panicked(panic_message(payload.as_ref())),
        };

        match attempt {
            Attempt::Success => {
                debug!(description, attempts, elapsed = ?started.elapsed(), "probe succeeded");
                return Ok(());
            }
            Attempt::NotYet => {
                debug!(description, attempts, "probe not ready yet");
            }
            Attempt::Error(source) if config.abort_on_error => {
                warn!(description, attempts, error = %source, "probe failed; aborting poll");
                return Err(ExecwatchError::ProbeAborted {
                    description: description.to_string(),
                    source,
                });
            }
            Attempt::Error(e) => {
                debug!(description, attempts, error = %e, "probe attempt failed");
            }
            Attempt::Panicked(msg) => {
                warn!(
                    description,
                    attempts,
                    panic = %msg,
                    "probe panicked; counting as failed attempt"
                );
            }
            Attempt::TimedOut(limit) => {
                debug!(description, attempts, ?limit, "probe attempt timed out");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            let waited = now - started;
            warn!(description, attempts, ?waited, "poll timed out");
            return Err(ExecwatchError::Timeout {
                description: description.to_string(),
                waited,
            });
        }

        sleep_until((now + config.interval).min(deadline)).await;
    }
}

async fn run_attempt<Fut>(fut: Fut, limit: Option<Duration>) -> Attempt
where
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let guarded = AssertUnwindSafe(fut).catch_unwind();

    let outcome = match limit {
        Some(limit) => match timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => return Attempt::TimedOut(limit),
        },
        None => guarded.await,
    };

    match outcome {
        Ok(Ok(true)) => Attempt::Success,
        Ok(Ok(false)) => Attempt::NotYet,
        Ok(Err(e)) => Attempt::Error(e),
        Err(payload) => Attempt::Panicked(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
