// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`backend`] defines the `RemoteExecutor` trait consumed by the rest of
//!   the crate, plus `CmdResult` and `RemoteStream`.
//! - [`process`] holds the `tokio::process` plumbing shared by executors.
//! - [`local`] runs commands on this machine with `sh -c`.
//! - [`kubectl`] runs commands inside pods with `kubectl exec`.

pub mod backend;
pub mod kubectl;
pub mod local;
pub mod process;

use std::sync::Arc;

pub use backend::{CmdResult, ExecFuture, OutputPipe, RemoteExecutor, RemoteProcess, RemoteStream};
pub use kubectl::KubectlExecutor;
pub use local::LocalExecutor;

use crate::config::ExecutorSection;
use crate::types::ExecutorKind;

/// Build the executor selected by the `[executor]` config section.
pub fn executor_from_config(section: &ExecutorSection) -> Arc<dyn RemoteExecutor> {
    match section.kind {
        ExecutorKind::Local => Arc::new(LocalExecutor::new()),
        ExecutorKind::Kubectl => Arc::new(KubectlExecutor::new(
            section.kubectl.clone(),
            section.kubectl_args.clone(),
        )),
    }
}
