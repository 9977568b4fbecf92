// tests/pattern_watch.rs
mod common;
use crate::common::builders::pod;
use crate::common::fake_executor::FakeExecutor;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;

use proptest::prelude::*;
use regex::Regex;
use tokio::time::{Duration, Instant, sleep};

use execwatch::background::{BackgroundCommand, CancelReason, CommandScope};
use execwatch::errors::ExecwatchError;
use execwatch::watch::{
    MatchResult, count_lines, count_matching, wait_until_match, watch_for,
};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(start_paused = true)]
async fn returns_as_soon_as_the_pattern_appears() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "status --follow", &scope).await?;
    let mut remote = executor.take_remote();

    let emitter = tokio::spawn(async move {
        remote.emit("STATUS=PENDING").await;
        sleep(Duration::from_secs(1)).await;
        remote.emit("STATUS=READY").await;
        remote
    });

    let started = Instant::now();
    wait_until_match(&handle, &Regex::new("STATUS=READY")?, Duration::from_secs(5)).await?;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "must not wait for the full timeout: {elapsed:?}");
    assert_eq!(handle.output(), vec!["STATUS=PENDING", "STATUS=READY"]);

    let _remote = emitter.await?;
    scope.close().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn times_out_when_nothing_arrives() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "status --follow", &scope).await?;
    let _remote = executor.take_remote();

    let started = Instant::now();
    let err = wait_until_match(&handle, &Regex::new("STATUS=READY")?, Duration::from_secs(2))
        .await
        .expect_err("nothing was emitted");
    let elapsed = started.elapsed();

    match &err {
        ExecwatchError::Timeout { description, waited } => {
            assert!(description.contains("STATUS=READY"), "{description}");
            assert!(description.contains("status --follow"), "{description}");
            assert!(*waited >= Duration::from_secs(2));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100));
    assert_eq!(count_lines(&handle), 0);

    scope.close().await;
    Ok(())
}

#[tokio::test]
async fn multiple_matches_are_all_kept() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "observe --type l7", &scope).await?;
    let mut remote = executor.take_remote();

    let l7 = Regex::new(r#""Type":"L7""#)?;
    remote.emit(r#"{"flow":{"Type":"L7","id":1}}"#).await;
    remote.emit(r#"{"flow":{"Type":"L7","id":2}}"#).await;
    remote.emit("--done--").await;

    wait_until_match(&handle, &l7, Duration::from_secs(5)).await?;
    // Make sure everything up to the marker has been consumed before stopping.
    wait_until_match(&handle, &Regex::new("^--done--$")?, Duration::from_secs(5)).await?;
    with_timeout(handle.stop()).await;

    assert_eq!(count_matching(&handle, &l7), 2);
    assert_eq!(count_lines(&handle), 3);

    scope.close().await;
    Ok(())
}

#[tokio::test]
async fn count_after_stop_includes_the_matching_line() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "observe --last 1", &scope).await?;
    let mut remote = executor.take_remote();

    remote.emit(r#"{"Type":"L7"}"#).await;
    wait_until_match(&handle, &Regex::new("L7")?, Duration::from_secs(5)).await?;
    with_timeout(handle.stop()).await;

    assert_eq!(count_lines(&handle), 1);

    scope.close().await;
    Ok(())
}

#[tokio::test]
async fn match_result_holds_lines_up_to_the_match() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "observe", &scope).await?;
    let mut remote = executor.take_remote();

    for line in ["a", "b", "hit", "c"] {
        remote.emit(line).await;
    }

    // Lines already in the buffer when the wait begins count too.
    wait_until_match(&handle, &Regex::new("^c$")?, Duration::from_secs(5)).await?;
    let result = watch_for(&handle, &Regex::new("^hit$")?, Duration::from_secs(5)).await;

    assert_eq!(
        result,
        MatchResult::Matched {
            line: "hit".to_string(),
            observed: vec!["a".to_string(), "b".to_string(), "hit".to_string()],
        }
    );
    assert_eq!(result.observed().len(), 3);

    scope.close().await;
    Ok(())
}

#[tokio::test]
async fn cancellation_unblocks_a_pending_wait() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "observe", &scope).await?;
    let _remote = executor.take_remote();

    let pattern = Regex::new("never")?;
    let (result, ()) = tokio::join!(
        with_timeout(wait_until_match(&handle, &pattern, Duration::from_secs(60))),
        async {
            tokio::task::yield_now().await;
            handle.cancel();
        }
    );

    match result {
        Err(ExecwatchError::Cancelled { reason, .. }) => {
            assert_eq!(reason, CancelReason::Requested)
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }

    scope.close().await;
    Ok(())
}

#[tokio::test]
async fn stream_end_without_match_fails_fast() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "observe", &scope).await?;
    let mut remote = executor.take_remote();

    remote.emit("unrelated").await;
    remote.exit(Some(1));

    let err = with_timeout(wait_until_match(&handle, &Regex::new("L3_L4")?, Duration::from_secs(60)))
        .await
        .expect_err("stream ended without a match");

    match err {
        ExecwatchError::StreamEnded { exit_code, .. } => assert_eq!(exit_code, Some(1)),
        other => panic!("expected StreamEnded, got {other:?}"),
    }
    assert_eq!(count_lines(&handle), 1);

    scope.close().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_waiters_each_see_the_match() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let scope = CommandScope::new();
    let handle = BackgroundCommand::start(&executor, pod("ns", "app"), "observe", &scope).await?;
    let mut remote = executor.take_remote();

    let ready = Regex::new("ready")?;
    let first_half = Regex::new("^half")?;

    let (a, b, ()) = tokio::join!(
        watch_for(&handle, &ready, Duration::from_secs(5)),
        watch_for(&handle, &first_half, Duration::from_secs(5)),
        async {
            remote.emit("half way").await;
            remote.emit("ready").await;
        }
    );

    assert!(a.is_match());
    assert!(b.is_match());
    assert_eq!(a.observed().len(), 2);
    assert_eq!(b.observed().len(), 1);

    scope.close().await;
    Ok(())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("building runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The wait succeeds iff some emitted line matches.
    #[test]
    fn matches_iff_some_line_matches(lines in proptest::collection::vec("[a-c]{0,4}", 0..12)) {
        let pattern = Regex::new("^abc$").unwrap();
        let expected = lines.iter().any(|l| pattern.is_match(l));

        let result = runtime().block_on(async {
            let executor = FakeExecutor::new();
            let scope = CommandScope::new();
            let handle = BackgroundCommand::start(&executor, pod("ns", "p"), "gen", &scope)
                .await
                .unwrap();
            let mut remote = executor.take_remote();
            for line in &lines {
                remote.emit(line).await;
            }
            remote.exit(Some(0));

            let result = watch_for(&handle, &pattern, Duration::from_secs(5)).await;
            scope.close().await;
            result
        });

        prop_assert_eq!(result.is_match(), expected);
        if !expected {
            let ended = matches!(result, MatchResult::Ended { .. });
            prop_assert!(ended);
        }
    }
}
