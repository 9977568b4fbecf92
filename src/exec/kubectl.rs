// src/exec/kubectl.rs

//! Executor that runs commands inside pods via `kubectl exec`.

use tokio::process::Command;

use crate::types::Target;

use super::backend::{CmdResult, ExecFuture, RemoteExecutor, RemoteStream};
use super::process::{run_to_completion, spawn_streaming};

#[derive(Debug, Clone)]
pub struct KubectlExecutor {
    kubectl: String,
    extra_args: Vec<String>,
}

impl KubectlExecutor {
    /// `kubectl` is the binary to invoke; `extra_args` go right after it
    /// (e.g. `--context kind-test`).
    pub fn new(kubectl: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            extra_args,
        }
    }

    /// Argument vector for `kubectl exec` of `command` on `target`.
    pub fn exec_args(&self, target: &Target, command: &str) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.push("exec".to_string());
        if let Some(ns) = &target.namespace {
            args.push("-n".to_string());
            args.push(ns.clone());
        }
        args.push(target.name.clone());
        if let Some(container) = &target.container {
            args.push("-c".to_string());
            args.push(container.clone());
        }
        args.extend(["--", "sh", "-c", command].map(String::from));
        args
    }

    fn command(&self, target: &Target, command: &str) -> Command {
        let mut cmd = Command::new(&self.kubectl);
        cmd.args(self.exec_args(target, command));
        cmd
    }
}

impl Default for KubectlExecutor {
    fn default() -> Self {
        Self::new("kubectl", Vec::new())
    }
}

impl RemoteExecutor for KubectlExecutor {
    fn run_sync<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, CmdResult> {
        Box::pin(async move {
            run_to_completion(self.command(target, command), &target.to_string(), command).await
        })
    }

    fn run_async<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, RemoteStream> {
        Box::pin(async move {
            spawn_streaming(self.command(target, command), &target.to_string(), command)
        })
    }
}
