// tests/readiness_workload.rs
mod common;
use crate::common::builders::pod;
use crate::common::fake_executor::{FakeExecutor, failed_result, ok_result};
use crate::common::init_tracing;

use std::error::Error;

use tokio::time::Duration;

use execwatch::errors::ExecwatchError;
use execwatch::exec::CmdResult;
use execwatch::poll::TimeoutConfig;
use execwatch::readiness::wait_until_ready;
use execwatch::types::Target;
use execwatch::workload::{KubectlWorkloads, WorkloadManager, parse_host_port, quote};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(start_paused = true)]
async fn readiness_polls_until_the_probe_command_succeeds() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new().with_sync_responses(vec![
        failed_result(1, "hubble not ready"),
        failed_result(1, "hubble not ready"),
        ok_result(),
    ]);
    let cilium = pod("kube-system", "cilium-abcde");
    let config = TimeoutConfig::new(Duration::from_secs(30)).with_interval(Duration::from_secs(1));

    wait_until_ready(
        &executor,
        &cilium,
        "cilium observe --since 0",
        "hubble to become ready",
        &config,
    )
    .await?;

    let calls = executor.sync_calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(t, c)| t == &cilium && c == "cilium observe --since 0"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn readiness_gives_up_after_the_timeout() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new().with_sync_responses(vec![failed_result(1, "nope"); 100]);
    let config = TimeoutConfig::new(Duration::from_secs(5)).with_interval(Duration::from_secs(1));

    let err = wait_until_ready(&executor, &pod("ns", "p"), "true", "p to be ready", &config)
        .await
        .expect_err("never becomes ready");

    assert!(err.is_timeout());
    assert!(err.to_string().contains("p to be ready"));
    // t = 0..=5
    assert_eq!(executor.sync_calls().len(), 6);
    Ok(())
}

fn workloads(executor: FakeExecutor) -> KubectlWorkloads<FakeExecutor> {
    KubectlWorkloads::new(executor, Target::new("k8s1"), "kubectl")
}

#[tokio::test]
async fn workload_operations_issue_kubectl_commands() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new();
    let wl = workloads(executor.clone());

    wl.namespace_delete("hubble-test").await?;
    wl.namespace_create("hubble-test").await?;
    wl.apply("/manifests/demo.yaml", Some("hubble-test")).await?;
    wl.wait_for_pods("hubble-test", "zgroup=testapp", Duration::from_secs(240))
        .await?;
    wl.annotate(
        "hubble-test",
        "id=app1,zgroup=testapp",
        "policy.cilium.io/proxy-visibility",
        "<Ingress/80/TCP/HTTP>",
    )
    .await?;
    wl.unannotate("hubble-test", "id=app1,zgroup=testapp", "policy.cilium.io/proxy-visibility")
        .await?;
    wl.delete("/manifests/demo.yaml", None).await?;

    let commands: Vec<String> = executor.sync_calls().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        commands,
        vec![
            "kubectl delete namespace hubble-test --ignore-not-found",
            "kubectl create namespace hubble-test",
            "kubectl apply -f /manifests/demo.yaml -n hubble-test",
            "kubectl wait --for=condition=Ready pod -n hubble-test -l zgroup=testapp --timeout=240s",
            "kubectl annotate pod -n hubble-test -l id=app1,zgroup=testapp 'policy.cilium.io/proxy-visibility=<Ingress/80/TCP/HTTP>' --overwrite",
            "kubectl annotate pod -n hubble-test -l id=app1,zgroup=testapp policy.cilium.io/proxy-visibility-",
            "kubectl delete -f /manifests/demo.yaml --ignore-not-found",
        ]
    );
    assert!(executor.sync_calls().iter().all(|(t, _)| t.name == "k8s1"));
    Ok(())
}

#[tokio::test]
async fn service_address_is_resolved_from_kubectl_output() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new().with_sync_responses(vec![CmdResult {
        stdout: "10.96.12.7:80\n".to_string(),
        stderr: String::new(),
        exit_code: Some(0),
    }]);
    let wl = workloads(executor);

    let (host, port) = wl.service_host_port("hubble-test", "app1-service").await?;
    assert_eq!(host, "10.96.12.7");
    assert_eq!(port, 80);
    Ok(())
}

#[tokio::test]
async fn failing_kubectl_surfaces_a_command_error() -> TestResult {
    init_tracing();

    let executor = FakeExecutor::new()
        .with_sync_responses(vec![failed_result(1, "namespaces \"x\" already exists\n")]);
    let wl = workloads(executor);

    let err = wl.namespace_create("x").await.expect_err("kubectl failed");
    match err {
        ExecwatchError::Command {
            command,
            exit_code,
            stderr,
        } => {
            assert_eq!(command, "kubectl create namespace x");
            assert_eq!(exit_code, Some(1));
            assert_eq!(stderr, "namespaces \"x\" already exists");
        }
        other => panic!("expected Command error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn host_port_parsing() {
    assert_eq!(parse_host_port("10.0.0.1:8080"), Some(("10.0.0.1".to_string(), 8080)));
    assert_eq!(parse_host_port("fd00::1:53"), Some(("fd00::1".to_string(), 53)));
    assert_eq!(parse_host_port(":80"), None);
    assert_eq!(parse_host_port("10.0.0.1"), None);
    assert_eq!(parse_host_port("10.0.0.1:http"), None);
}

#[test]
fn quoting_only_wraps_unsafe_words() {
    assert_eq!(quote("zgroup=testapp"), "zgroup=testapp");
    assert_eq!(quote("a b"), "'a b'");
    assert_eq!(quote("it's"), r"'it'\''s'");
    assert_eq!(quote(""), "''");
}
