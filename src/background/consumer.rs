// src/background/consumer.rs

//! The single task that drains a background command's output into its
//! buffer.

use std::future::pending;

use tokio::io::{AsyncBufReadExt, BufReader, Split};
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::exec::{OutputPipe, RemoteStream};

use super::buffer::{CancelReason, OutputWriter, StreamState};

/// Everything that can stop a consumer besides the stream itself.
pub(crate) struct StopSignals {
    /// Fires on `cancel`, or errors when the handle is dropped.
    pub cancel_rx: oneshot::Receiver<()>,
    /// Flips to `true` when the scope is cancelled.
    pub scope_rx: watch::Receiver<bool>,
    pub deadline: Option<Instant>,
}

enum Stop {
    Cancelled(CancelReason),
    Exited(Option<i32>),
    Failed(String),
}

/// Drain `stream` into `writer` until both pipes are closed and the process
/// has exited, or a stop signal fires. On cancellation the remote process is
/// killed before the terminal state is recorded, so no line is appended after
/// it.
pub(crate) async fn consume(
    handle_id: u64,
    label: String,
    stream: RemoteStream,
    writer: OutputWriter,
    signals: StopSignals,
) {
    let RemoteStream {
        stdout,
        stderr,
        mut process,
    } = stream;
    let StopSignals {
        mut cancel_rx,
        mut scope_rx,
        deadline,
    } = signals;

    let mut out_lines = BufReader::new(stdout).split(b'\n');
    let mut err_lines: Option<Split<BufReader<OutputPipe>>> =
        stderr.map(|s| BufReader::new(s).split(b'\n'));
    let mut stdout_open = true;

    let deadline_hit = async move {
        match deadline {
            Some(at) => sleep_until(at).await,
            None => pending::<()>().await,
        }
    };
    tokio::pin!(deadline_hit);

    let stop = loop {
        tokio::select! {
            biased;

            _ = &mut cancel_rx => break Stop::Cancelled(CancelReason::Requested),

            _ = scope_cancelled(&mut scope_rx) => break Stop::Cancelled(CancelReason::ScopeClosed),

            _ = &mut deadline_hit => break Stop::Cancelled(CancelReason::DeadlineExceeded),

            line = out_lines.next_segment(), if stdout_open => match line {
                Ok(Some(raw)) => {
                    let line = decode_line(raw);
                    debug!(handle = handle_id, cmd = %label, "stdout: {}", line);
                    writer.push_stdout(line);
                }
                Ok(None) => {
                    debug!(handle = handle_id, cmd = %label, "stdout closed");
                    stdout_open = false;
                }
                Err(e) => break Stop::Failed(format!("reading stdout: {e}")),
            },

            line = next_stderr(&mut err_lines), if err_lines.is_some() => match line {
                Some(raw) => {
                    let line = decode_line(raw);
                    debug!(handle = handle_id, cmd = %label, "stderr: {}", line);
                    writer.push_stderr(line);
                }
                None => err_lines = None,
            },

            status = process.wait(), if !stdout_open && err_lines.is_none() => match status {
                Ok(code) => break Stop::Exited(code),
                Err(e) => break Stop::Failed(format!("waiting for process: {e}")),
            },
        }
    };

    match stop {
        Stop::Cancelled(reason) => {
            info!(handle = handle_id, cmd = %label, %reason, "cancelling background command");
            if let Err(e) = process.kill().await {
                warn!(
                    handle = handle_id,
                    cmd = %label,
                    error = %e,
                    "failed to kill background command on cancellation"
                );
            }
            writer.finish(StreamState::Cancelled(reason));
        }
        Stop::Exited(code) => {
            info!(handle = handle_id, cmd = %label, exit_code = ?code, "background command exited");
            writer.finish(StreamState::Exited(code));
        }
        Stop::Failed(msg) => {
            warn!(handle = handle_id, cmd = %label, error = %msg, "background command failed");
            let _ = process.kill().await;
            writer.finish(StreamState::Failed(msg));
        }
    }
}

/// Resolves once the scope flag is `true`; never resolves if the scope is
/// gone without having been cancelled.
async fn scope_cancelled(rx: &mut watch::Receiver<bool>) {
    let sender_alive = rx.wait_for(|cancelled| *cancelled).await.is_ok();
    if !sender_alive {
        pending::<()>().await;
    }
}

/// Next raw stderr line; `None` on EOF or read error (stderr is best effort).
async fn next_stderr(lines: &mut Option<Split<BufReader<OutputPipe>>>) -> Option<Vec<u8>> {
    match lines {
        Some(lines) => lines.next_segment().await.ok().flatten(),
        None => pending().await,
    }
}

/// Output is opaque bytes: invalid UTF-8 is replaced, not rejected, and a
/// trailing `\r` is dropped.
fn decode_line(mut raw: Vec<u8>) -> String {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    match String::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
