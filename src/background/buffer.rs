// src/background/buffer.rs

//! Append-only output buffer shared between one consumer task and any number
//! of readers.
//!
//! The buffer is a `tokio::sync::watch` channel holding the whole
//! [`OutputLog`]. The consumer task owns the only [`OutputWriter`]; readers
//! hold cloned [`OutputReader`]s, always see whole lines, and are woken on
//! every append and on the terminal state transition.

use std::fmt;

use tokio::sync::watch;

/// Why a background command was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The owner called `cancel`/`stop` or dropped the handle.
    Requested,
    /// The enclosing scope was cancelled or closed.
    ScopeClosed,
    /// The enclosing scope's deadline passed.
    DeadlineExceeded,
    /// The consumer task was aborted before it could record an outcome.
    Aborted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::Requested => "cancel requested",
            CancelReason::ScopeClosed => "scope closed",
            CancelReason::DeadlineExceeded => "scope deadline exceeded",
            CancelReason::Aborted => "consumer aborted",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a background command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Running,
    /// The process exited on its own; `None` if killed by a signal.
    Exited(Option<i32>),
    Cancelled(CancelReason),
    /// Reading output or waiting for the process failed.
    Failed(String),
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamState::Running)
    }
}

/// Everything captured from one background command so far.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    stdout: Vec<String>,
    stderr: Vec<String>,
    state: StreamState,
}

impl OutputLog {
    pub fn lines(&self) -> &[String] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }
}

/// Create a connected writer/reader pair over an empty, running log.
pub fn output_channel() -> (OutputWriter, OutputReader) {
    let (tx, rx) = watch::channel(OutputLog::default());
    (OutputWriter { tx }, OutputReader { rx })
}

/// Write half of the buffer. Exactly one exists per background command.
#[derive(Debug)]
pub struct OutputWriter {
    tx: watch::Sender<OutputLog>,
}

impl OutputWriter {
    /// Append a stdout line. Returns `false` (and drops the line) once the
    /// log has reached a terminal state.
    pub fn push_stdout(&self, line: String) -> bool {
        self.tx.send_if_modified(|log| {
            if log.state.is_terminal() {
                return false;
            }
            log.stdout.push(line);
            true
        })
    }

    pub fn push_stderr(&self, line: String) -> bool {
        self.tx.send_if_modified(|log| {
            if log.state.is_terminal() {
                return false;
            }
            log.stderr.push(line);
            true
        })
    }

    /// Record the terminal state. Only the first call has any effect.
    pub fn finish(&self, state: StreamState) {
        self.tx.send_if_modified(|log| {
            if log.state.is_terminal() || !state.is_terminal() {
                return false;
            }
            log.state = state;
            true
        });
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        // Covers consumer tasks aborted or panicking mid-stream.
        self.finish(StreamState::Cancelled(CancelReason::Aborted));
    }
}

/// Read half of the buffer. Cheap to clone; each clone tracks its own
/// "seen" version for [`OutputReader::changed`].
#[derive(Debug, Clone)]
pub struct OutputReader {
    rx: watch::Receiver<OutputLog>,
}

impl OutputReader {
    /// Consistent copy of the whole log.
    pub fn snapshot(&self) -> OutputLog {
        self.rx.borrow().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.rx.borrow().stdout.clone()
    }

    pub fn stderr(&self) -> Vec<String> {
        self.rx.borrow().stderr.clone()
    }

    pub fn line_count(&self) -> usize {
        self.rx.borrow().stdout.len()
    }

    pub fn state(&self) -> StreamState {
        self.rx.borrow().state.clone()
    }

    /// Run `f` over the current log and mark it as seen by this reader.
    pub fn inspect<R>(&mut self, f: impl FnOnce(&OutputLog) -> R) -> R {
        let log = self.rx.borrow_and_update();
        f(&log)
    }

    /// Wait until the log changes after the last [`OutputReader::inspect`].
    ///
    /// Returns `false` once the writer is gone and no change can follow.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait for the terminal state and return it.
    pub async fn finished(&mut self) -> StreamState {
        loop {
            let state = self.inspect(|log| log.state.clone());
            if state.is_terminal() {
                return state;
            }
            if !self.changed().await {
                return self.state();
            }
        }
    }
}
