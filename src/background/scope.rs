// src/background/scope.rs

//! Lifetime boundary for background commands.
//!
//! Every consumer task is spawned into a [`CommandScope`]. Closing the scope
//! cancels all of its commands and joins their tasks; dropping it cancels
//! and aborts whatever is still running. No background command outlives the
//! scope it was started in.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Grace period used by [`CommandScope::close`] unless overridden.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// What [`CommandScope::close`] had to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseSummary {
    /// Consumer tasks that finished within the grace period.
    pub joined: usize,
    /// Consumer tasks that had to be aborted.
    pub aborted: usize,
}

#[derive(Debug)]
pub struct CommandScope {
    cancel_tx: watch::Sender<bool>,
    deadline: Option<Instant>,
    grace: Duration,
    tasks: Mutex<Vec<(u64, JoinHandle<()>)>>,
}

impl CommandScope {
    /// A scope without a deadline.
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            cancel_tx,
            deadline: None,
            grace: DEFAULT_GRACE_PERIOD,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// A scope whose commands are cancelled once `timeout` has elapsed.
    pub fn with_deadline(timeout: Duration) -> Self {
        let mut scope = Self::new();
        scope.deadline = Some(Instant::now() + timeout);
        scope
    }

    /// Override how long [`CommandScope::close`] waits for tasks to wind down.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Signal every command in the scope to stop. Idempotent; does not wait.
    pub fn cancel(&self) {
        if !self.cancel_tx.send_replace(true) {
            debug!("command scope cancelled");
        }
    }

    /// Number of consumer tasks that have not finished yet.
    pub fn len(&self) -> usize {
        self.tasks()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every command and join all consumer tasks.
    ///
    /// Tasks still running after the grace period are aborted; aborting
    /// drops the remote stream, which kills the underlying process.
    pub async fn close(&self) -> CloseSummary {
        self.cancel();

        let tasks = std::mem::take(&mut *self.tasks());
        let until = Instant::now() + self.grace;
        let mut summary = CloseSummary::default();

        for (id, mut handle) in tasks {
            match timeout_at(until, &mut handle).await {
                Ok(Ok(())) => summary.joined += 1,
                Ok(Err(e)) => {
                    warn!(handle = id, error = %e, "background consumer task ended abnormally");
                    summary.joined += 1;
                }
                Err(_) => {
                    warn!(
                        handle = id,
                        grace = ?self.grace,
                        "background consumer did not stop within grace period; aborting"
                    );
                    handle.abort();
                    summary.aborted += 1;
                }
            }
        }

        info!(
            joined = summary.joined,
            aborted = summary.aborted,
            "command scope closed"
        );
        summary
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    pub(crate) fn spawn<F>(&self, id: u64, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut tasks = self.tasks();
        tasks.retain(|(_, h)| !h.is_finished());
        tasks.push((id, handle));
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<(u64, JoinHandle<()>)>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CommandScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandScope {
    fn drop(&mut self) {
        self.cancel();
        let tasks = std::mem::take(&mut *self.tasks());
        let running = tasks.iter().filter(|(_, h)| !h.is_finished()).count();
        if running > 0 {
            debug!(running, "command scope dropped without close; aborting consumers");
        }
        for (_, handle) in tasks {
            handle.abort();
        }
    }
}
