// src/exec/local.rs

use tracing::debug;

use crate::types::Target;

use super::backend::{CmdResult, ExecFuture, RemoteExecutor, RemoteStream};
use super::process::{run_to_completion, shell, spawn_streaming};

/// Runs every command on this machine with `sh -c`.
///
/// The target is not interpreted; it only shows up in logs and errors.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl RemoteExecutor for LocalExecutor {
    fn run_sync<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, CmdResult> {
        Box::pin(async move {
            run_to_completion(shell(command), &target.to_string(), command).await
        })
    }

    fn run_async<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, RemoteStream> {
        Box::pin(async move {
            debug!(target = %target, cmd = %command, "launching local background command");
            spawn_streaming(shell(command), &target.to_string(), command)
        })
    }
}
