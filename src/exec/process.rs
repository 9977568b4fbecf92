// src/exec/process.rs

//! OS process plumbing shared by the concrete executors.

use std::process::Stdio;

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::errors::{ExecwatchError, Result};

use super::backend::{CmdResult, ExecFuture, OutputPipe, RemoteProcess, RemoteStream};

/// Build a shell command appropriate for the platform.
pub fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

/// Run `cmd` to completion, capturing both pipes.
///
/// `target` and `command` are only used for logging and error reporting.
pub async fn run_to_completion(
    mut cmd: Command,
    target: &str,
    command: &str,
) -> Result<CmdResult> {
    debug!(target = %target, cmd = %command, "running one-shot command");

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd
        .output()
        .await
        .with_context(|| format!("running '{command}'"))
        .map_err(|source| ExecwatchError::Start {
            target: target.to_string(),
            command: command.to_string(),
            source,
        })?;

    let result = CmdResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
    };

    debug!(
        target = %target,
        cmd = %command,
        exit_code = ?result.exit_code,
        "one-shot command finished"
    );

    Ok(result)
}

/// Spawn `cmd` with piped output and return it as a [`RemoteStream`].
///
/// The child is killed if the stream is dropped without an explicit kill.
pub fn spawn_streaming(mut cmd: Command, target: &str, command: &str) -> Result<RemoteStream> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for '{command}'"))
        .map_err(|source| ExecwatchError::Start {
            target: target.to_string(),
            command: command.to_string(),
            source,
        })?;

    info!(target = %target, cmd = %command, pid = ?child.id(), "background process started");

    let stdout = child.stdout.take().ok_or_else(|| ExecwatchError::Start {
        target: target.to_string(),
        command: command.to_string(),
        source: anyhow::anyhow!("stdout pipe unavailable"),
    })?;
    let stderr = child.stderr.take();

    Ok(RemoteStream {
        stdout: Box::new(stdout),
        stderr: stderr.map(|s| Box::new(s) as OutputPipe),
        process: Box::new(ChildProcess { child }),
    })
}

/// [`RemoteProcess`] over a local child process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl RemoteProcess for ChildProcess {
    fn kill(&mut self) -> ExecFuture<'_, ()> {
        Box::pin(async move {
            // Nothing to kill once the child has been reaped.
            if self.child.try_wait()?.is_none() {
                self.child.kill().await?;
            }
            Ok(())
        })
    }

    fn wait(&mut self) -> ExecFuture<'_, Option<i32>> {
        Box::pin(async move {
            let status = self.child.wait().await?;
            Ok(status.code())
        })
    }
}
