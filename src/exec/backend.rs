// src/exec/backend.rs

//! Pluggable remote executor abstraction.
//!
//! Everything above this layer talks to a `RemoteExecutor` instead of
//! spawning processes directly. Production code uses [`LocalExecutor`] or
//! [`KubectlExecutor`]; tests provide an in-memory implementation whose
//! output streams they drive by hand.
//!
//! [`LocalExecutor`]: super::LocalExecutor
//! [`KubectlExecutor`]: super::KubectlExecutor

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::AsyncRead;

use crate::errors::Result;
use crate::types::Target;

/// Boxed future returned by executor methods.
pub type ExecFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A readable output pipe of a running command.
pub type OutputPipe = Box<dyn AsyncRead + Send + Unpin>;

/// Completed result of a one-shot command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CmdResult {
    pub fn was_successful(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout split into lines, trailing empty line dropped.
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }
}

/// Control half of a running remote command.
pub trait RemoteProcess: Send {
    /// Terminate the command. Killing an already exited process is not an
    /// error.
    fn kill(&mut self) -> ExecFuture<'_, ()>;

    /// Wait for the command to exit and return its exit code.
    fn wait(&mut self) -> ExecFuture<'_, Option<i32>>;
}

/// A running remote command: its output pipes plus a control handle.
pub struct RemoteStream {
    pub stdout: OutputPipe,
    pub stderr: Option<OutputPipe>,
    pub process: Box<dyn RemoteProcess>,
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream")
            .field("has_stderr", &self.stderr.is_some())
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how commands run on a target.
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` on `target` and wait for it to finish.
    fn run_sync<'a>(&'a self, target: &'a Target, command: &'a str)
    -> ExecFuture<'a, CmdResult>;

    /// Launch `command` on `target` and return immediately with its output
    /// pipes. Fails with `ExecwatchError::Start` if the launch fails.
    fn run_async<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, RemoteStream>;
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for Arc<E> {
    fn run_sync<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, CmdResult> {
        (**self).run_sync(target, command)
    }

    fn run_async<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, RemoteStream> {
        (**self).run_async(target, command)
    }
}
