// src/background/handle.rs

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::errors::{ExecwatchError, Result};
use crate::exec::RemoteExecutor;
use crate::types::Target;

use super::buffer::{CancelReason, OutputReader, StreamState, output_channel};
use super::consumer::{StopSignals, consume};
use super::scope::CommandScope;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// One long-running command on a target whose output is captured while the
/// caller carries on.
///
/// The handle owns the cancellation channel of its consumer task; the task
/// itself is owned by the [`CommandScope`] it was started in. Dropping the
/// handle cancels the command.
#[derive(Debug)]
pub struct BackgroundCommand {
    id: u64,
    target: Target,
    command: String,
    reader: OutputReader,
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl BackgroundCommand {
    /// Launch `command` on `target` and start capturing its output.
    ///
    /// Returns as soon as the command is running. Launch failures surface
    /// here as `ExecwatchError::Start`; no handle is produced then.
    pub async fn start<E>(
        executor: &E,
        target: Target,
        command: impl Into<String>,
        scope: &CommandScope,
    ) -> Result<Self>
    where
        E: RemoteExecutor + ?Sized,
    {
        let command = command.into();

        if scope.is_cancelled() {
            return Err(ExecwatchError::Cancelled {
                description: format!("starting `{command}` on {target}"),
                reason: CancelReason::ScopeClosed,
            });
        }

        let stream = executor.run_async(&target, &command).await?;

        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        let (writer, reader) = output_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let signals = StopSignals {
            cancel_rx,
            scope_rx: scope.subscribe(),
            deadline: scope.deadline(),
        };

        info!(handle = id, target = %target, cmd = %command, "background command started");
        scope.spawn(id, consume(id, command.clone(), stream, writer, signals));

        Ok(Self {
            id,
            target,
            command,
            reader,
            cancel_tx: Mutex::new(Some(cancel_tx)),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Ask the consumer to kill the command and stop reading.
    ///
    /// Idempotent: cancelling a finished or already cancelled command is a
    /// no-op. Does not wait; use [`BackgroundCommand::stop`] for that.
    pub fn cancel(&self) {
        let sender = self
            .cancel_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(handle = self.id, "background command already finished");
                }
            }
            None => debug!(handle = self.id, "background command already cancelled"),
        }
    }

    /// Cancel and wait until the consumer has recorded its final state.
    pub async fn stop(&self) -> StreamState {
        self.cancel();
        self.wait_finished().await
    }

    /// Wait until the command has exited, failed or been cancelled.
    pub async fn wait_finished(&self) -> StreamState {
        self.reader.clone().finished().await
    }

    /// Snapshot of the stdout lines captured so far.
    pub fn output(&self) -> Vec<String> {
        self.reader.lines()
    }

    /// Snapshot of the stderr lines captured so far.
    pub fn stderr(&self) -> Vec<String> {
        self.reader.stderr()
    }

    pub fn line_count(&self) -> usize {
        self.reader.line_count()
    }

    pub fn state(&self) -> StreamState {
        self.reader.state()
    }

    pub fn is_running(&self) -> bool {
        !self.state().is_terminal()
    }

    /// A fresh reader over this command's buffer.
    pub fn subscribe(&self) -> OutputReader {
        self.reader.clone()
    }
}
