// tests/local_executor.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;

use regex::Regex;
use tokio::time::Duration;

use execwatch::background::{BackgroundCommand, CancelReason, CommandScope, StreamState};
use execwatch::errors::ExecwatchError;
use execwatch::exec::{KubectlExecutor, LocalExecutor, RemoteExecutor};
use execwatch::types::Target;
use execwatch::watch::{count_matching, wait_until_match};

type TestResult = Result<(), Box<dyn Error>>;

fn local() -> Target {
    Target::new("localhost")
}

#[tokio::test]
async fn run_sync_reports_output_and_exit_code() -> TestResult {
    init_tracing();

    let executor = LocalExecutor::new();

    let ok = executor.run_sync(&local(), "echo hello; echo oops >&2").await?;
    assert!(ok.was_successful());
    assert_eq!(ok.stdout_lines(), vec!["hello"]);
    assert_eq!(ok.stderr.trim(), "oops");

    let failed = executor.run_sync(&local(), "exit 3").await?;
    assert!(!failed.was_successful());
    assert_eq!(failed.exit_code, Some(3));
    Ok(())
}

#[tokio::test]
async fn background_process_is_killed_on_stop() -> TestResult {
    init_tracing();

    let executor = LocalExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(
        &executor,
        local(),
        "for i in 1 2 3; do echo line$i; done; sleep 30",
        &scope,
    )
    .await?;

    with_timeout(wait_until_match(
        &handle,
        &Regex::new("^line3$")?,
        Duration::from_secs(4),
    ))
    .await?;

    let state = with_timeout(handle.stop()).await;
    assert_eq!(state, StreamState::Cancelled(CancelReason::Requested));
    assert_eq!(handle.output(), vec!["line1", "line2", "line3"]);
    assert_eq!(count_matching(&handle, &Regex::new("line[12]")?), 2);

    let summary = with_timeout(scope.close()).await;
    assert_eq!(summary.aborted, 0);
    Ok(())
}

#[tokio::test]
async fn short_lived_process_reports_its_exit_code() -> TestResult {
    init_tracing();

    let executor = LocalExecutor::new();
    let scope = CommandScope::new();
    let handle =
        BackgroundCommand::start(&executor, local(), "echo done; echo bad >&2; exit 7", &scope)
            .await?;

    let state = with_timeout(handle.wait_finished()).await;
    assert_eq!(state, StreamState::Exited(Some(7)));
    assert_eq!(handle.output(), vec!["done"]);
    assert_eq!(handle.stderr(), vec!["bad"]);

    let err = wait_until_match(&handle, &Regex::new("never")?, Duration::from_secs(1))
        .await
        .expect_err("stream already ended");
    assert!(
        matches!(err, ExecwatchError::StreamEnded { exit_code: Some(7), .. }),
        "got {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_output_does_not_end_the_watch() -> TestResult {
    init_tracing();

    let executor = LocalExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(
        &executor,
        local(),
        r"printf 'a\n\377bad\r\n'; printf 'oops\377\n' >&2; echo READY",
        &scope,
    )
    .await?;

    with_timeout(wait_until_match(
        &handle,
        &Regex::new("^READY$")?,
        Duration::from_secs(4),
    ))
    .await?;

    let state = with_timeout(handle.wait_finished()).await;
    assert_eq!(state, StreamState::Exited(Some(0)));
    assert_eq!(handle.output(), vec!["a", "\u{FFFD}bad", "READY"]);
    assert_eq!(handle.stderr(), vec!["oops\u{FFFD}"]);

    scope.close().await;
    Ok(())
}

#[tokio::test]
async fn missing_binary_is_a_start_error() -> TestResult {
    init_tracing();

    let executor = KubectlExecutor::new("/nonexistent/kubectl", Vec::new());
    let err = executor
        .run_sync(&Target::new("pod"), "true")
        .await
        .expect_err("binary does not exist");
    assert!(matches!(err, ExecwatchError::Start { .. }), "got {err:?}");

    let scope = CommandScope::new();
    let err = BackgroundCommand::start(&executor, Target::new("pod"), "true", &scope)
        .await
        .expect_err("binary does not exist");
    assert!(matches!(err, ExecwatchError::Start { .. }), "got {err:?}");
    assert!(scope.is_empty());
    Ok(())
}

#[test]
fn kubectl_exec_arguments() {
    let executor = KubectlExecutor::new(
        "kubectl",
        vec!["--context".to_string(), "kind-test".to_string()],
    );
    let target = Target::new("cilium-abcde")
        .in_namespace("kube-system")
        .with_container("cilium-agent");

    assert_eq!(
        executor.exec_args(&target, "hubble observe --follow"),
        vec![
            "--context",
            "kind-test",
            "exec",
            "-n",
            "kube-system",
            "cilium-abcde",
            "-c",
            "cilium-agent",
            "--",
            "sh",
            "-c",
            "hubble observe --follow",
        ]
    );

    assert_eq!(
        KubectlExecutor::default().exec_args(&Target::new("app1"), "true"),
        vec!["exec", "app1", "--", "sh", "-c", "true"]
    );
}
