// src/readiness.rs

//! Readiness checks: repeat a one-shot command until it succeeds.

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::RemoteExecutor;
use crate::poll::{TimeoutConfig, poll_fallible};
use crate::types::Target;

/// Poll `probe_command` on `target` until it exits with status 0.
///
/// Launch errors and non-zero exits both count as "not ready yet"; the poll
/// gives up with `ExecwatchError::Timeout` once `config` runs out (or with
/// `ProbeAborted` on a launch error if `abort_on_error` is set).
pub async fn wait_until_ready<E>(
    executor: &E,
    target: &Target,
    probe_command: &str,
    description: &str,
    config: &TimeoutConfig,
) -> Result<()>
where
    E: RemoteExecutor + ?Sized,
{
    info!(
        target = %target,
        cmd = %probe_command,
        timeout = ?config.timeout(),
        "waiting for readiness"
    );

    poll_fallible(
        description,
        || async move {
            let res = executor.run_sync(target, probe_command).await?;
            if !res.was_successful() {
                debug!(
                    target = %target,
                    exit_code = ?res.exit_code,
                    stderr = %res.stderr.trim(),
                    "readiness probe not successful"
                );
            }
            Ok(res.was_successful())
        },
        config,
    )
    .await
}
