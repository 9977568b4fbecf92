// src/workload.rs

//! Namespace / manifest / pod-group management, consumed as an external
//! capability.
//!
//! [`KubectlWorkloads`] implements [`WorkloadManager`] by running `kubectl`
//! command lines through a [`RemoteExecutor`] on a control target (the local
//! machine, or a node that has `kubectl` configured).

use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::errors::{ExecwatchError, Result};
use crate::exec::{CmdResult, ExecFuture, RemoteExecutor};
use crate::types::Target;

/// Operations on logical groupings of processes.
pub trait WorkloadManager: Send + Sync {
    fn namespace_create<'a>(&'a self, namespace: &'a str) -> ExecFuture<'a, ()>;

    /// Delete `namespace`; deleting a missing namespace succeeds.
    fn namespace_delete<'a>(&'a self, namespace: &'a str) -> ExecFuture<'a, ()>;

    /// Apply the manifest at `path` (a path on the control target).
    fn apply<'a>(&'a self, path: &'a str, namespace: Option<&'a str>) -> ExecFuture<'a, ()>;

    fn delete<'a>(&'a self, path: &'a str, namespace: Option<&'a str>) -> ExecFuture<'a, ()>;

    /// Wait until every pod matching `selector` in `namespace` is ready.
    fn wait_for_pods<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
        timeout: Duration,
    ) -> ExecFuture<'a, ()>;

    /// Resolve a service to its cluster address and first port.
    fn service_host_port<'a>(
        &'a self,
        namespace: &'a str,
        service: &'a str,
    ) -> ExecFuture<'a, (String, u16)>;

    /// Set `key=value` on every pod matching `selector`.
    fn annotate<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
        key: &'a str,
        value: &'a str,
    ) -> ExecFuture<'a, ()>;

    /// Remove `key` from every pod matching `selector`.
    fn unannotate<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
        key: &'a str,
    ) -> ExecFuture<'a, ()>;
}

#[derive(Debug, Clone)]
pub struct KubectlWorkloads<E> {
    executor: E,
    control: Target,
    kubectl: String,
}

impl<E: RemoteExecutor> KubectlWorkloads<E> {
    pub fn new(executor: E, control: Target, kubectl: impl Into<String>) -> Self {
        Self {
            executor,
            control,
            kubectl: kubectl.into(),
        }
    }

    fn command_line(&self, args: &[&str]) -> String {
        let mut line = quote(&self.kubectl);
        for arg in args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line
    }

    /// Run `kubectl <args>` on the control target, failing on non-zero exit.
    async fn kubectl(&self, args: &[&str]) -> Result<CmdResult> {
        let line = self.command_line(args);
        debug!(control = %self.control, cmd = %line, "running kubectl");

        let res = self.executor.run_sync(&self.control, &line).await?;
        if !res.was_successful() {
            return Err(ExecwatchError::Command {
                command: line,
                exit_code: res.exit_code,
                stderr: res.stderr.trim().to_string(),
            });
        }
        Ok(res)
    }
}

impl<E: RemoteExecutor> WorkloadManager for KubectlWorkloads<E> {
    fn namespace_create<'a>(&'a self, namespace: &'a str) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            self.kubectl(&["create", "namespace", namespace]).await?;
            info!(namespace, "namespace created");
            Ok(())
        })
    }

    fn namespace_delete<'a>(&'a self, namespace: &'a str) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            self.kubectl(&["delete", "namespace", namespace, "--ignore-not-found"])
                .await?;
            info!(namespace, "namespace deleted");
            Ok(())
        })
    }

    fn apply<'a>(&'a self, path: &'a str, namespace: Option<&'a str>) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            let mut args = vec!["apply", "-f", path];
            if let Some(ns) = namespace {
                args.extend(["-n", ns]);
            }
            self.kubectl(&args).await?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, path: &'a str, namespace: Option<&'a str>) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            let mut args = vec!["delete", "-f", path, "--ignore-not-found"];
            if let Some(ns) = namespace {
                args.extend(["-n", ns]);
            }
            self.kubectl(&args).await?;
            Ok(())
        })
    }

    fn wait_for_pods<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
        timeout: Duration,
    ) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            let timeout_arg = format!("--timeout={}s", timeout.as_secs().max(1));
            self.kubectl(&[
                "wait",
                "--for=condition=Ready",
                "pod",
                "-n",
                namespace,
                "-l",
                selector,
                timeout_arg.as_str(),
            ])
            .await?;
            info!(namespace, selector, "pods ready");
            Ok(())
        })
    }

    fn service_host_port<'a>(
        &'a self,
        namespace: &'a str,
        service: &'a str,
    ) -> ExecFuture<'a, (String, u16)> {
        Box::pin(async move {
            let res = self
                .kubectl(&[
                    "get",
                    "service",
                    service,
                    "-n",
                    namespace,
                    "-o",
                    "jsonpath={.spec.clusterIP}:{.spec.ports[0].port}",
                ])
                .await?;
            parse_host_port(res.stdout.trim())
                .ok_or_else(|| {
                    anyhow!(
                        "unexpected address '{}' for service {namespace}/{service}",
                        res.stdout.trim()
                    )
                })
                .map_err(ExecwatchError::from)
        })
    }

    fn annotate<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
        key: &'a str,
        value: &'a str,
    ) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            let pair = format!("{key}={value}");
            self.kubectl(&[
                "annotate",
                "pod",
                "-n",
                namespace,
                "-l",
                selector,
                pair.as_str(),
                "--overwrite",
            ])
            .await?;
            Ok(())
        })
    }

    fn unannotate<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
        key: &'a str,
    ) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            let removal = format!("{key}-");
            self.kubectl(&["annotate", "pod", "-n", namespace, "-l", selector, removal.as_str()])
                .await?;
            Ok(())
        })
    }
}

/// Parse `host:port`, with the port after the last colon.
pub fn parse_host_port(s: &str) -> Option<(String, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}

/// Single-quote `s` for `sh` unless it only contains safe characters.
pub fn quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=,:@%+".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
