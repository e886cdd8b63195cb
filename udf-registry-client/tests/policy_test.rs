//! Retry and timeout behavior of the policy executor.

mod common;

use std::time::Duration;

use common::{quick_policy, Fault, MockCluster};
use udf_registry_client::{CallPolicy, PolicyExecutor, UdfError, UdfType};
use udf_registry_core::protocol::{list_command, remove_command};

#[tokio::test]
async fn test_returns_value_without_echo() {
    let cluster = MockCluster::new().with_module("a.lua", b"1");
    let value = PolicyExecutor::execute(&cluster, &quick_policy(0), &list_command())
        .await
        .unwrap();
    assert!(value.starts_with("filename=a.lua,"));
    assert!(!value.ends_with('\n'));
}

#[tokio::test]
async fn test_succeeds_after_transient_failures() {
    let cluster = MockCluster::new();
    cluster.fail_next(2);

    let result = PolicyExecutor::execute(&cluster, &quick_policy(2), &list_command()).await;
    assert!(result.is_ok());
    assert_eq!(cluster.calls(), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let cluster = MockCluster::new();
    cluster.fail_next(10);

    let err = PolicyExecutor::execute(&cluster, &quick_policy(3), &list_command())
        .await
        .unwrap_err();
    assert!(matches!(err, UdfError::Transport(ref m) if m.contains("injected")));
    assert_eq!(cluster.calls(), 4);
}

#[tokio::test]
async fn test_zero_retries_means_single_attempt() {
    let cluster = MockCluster::new();
    cluster.fail_next(1);

    let result = PolicyExecutor::execute(&cluster, &quick_policy(0), &list_command()).await;
    assert!(result.is_err());
    assert_eq!(cluster.calls(), 1);
}

#[tokio::test]
async fn test_not_found_is_never_retried() {
    let cluster = MockCluster::new();

    let err = PolicyExecutor::execute(
        &cluster,
        &quick_policy(5),
        &remove_command("ghost.lua", UdfType::Lua),
    )
    .await
    .unwrap_err();
    assert!(err.is_server_rejection());
    assert_eq!(cluster.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_node_times_out() {
    let cluster = MockCluster::new();
    cluster.inject(Fault::Delay(Duration::from_secs(5)));
    let policy = CallPolicy::builder()
        .timeout(Duration::from_secs(1))
        .max_retries(0)
        .build()
        .unwrap();

    let err = PolicyExecutor::execute(&cluster, &policy, &list_command())
        .await
        .unwrap_err();
    assert!(matches!(err, UdfError::Timeout(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_retried() {
    let cluster = MockCluster::new().with_module("a.lua", b"1");
    cluster.inject(Fault::Delay(Duration::from_secs(5)));
    let policy = CallPolicy::builder()
        .timeout(Duration::from_secs(1))
        .max_retries(1)
        .jitter(0.0)
        .build()
        .unwrap();

    let value = PolicyExecutor::execute(&cluster, &policy, &list_command())
        .await
        .unwrap();
    assert!(value.contains("a.lua"));
    assert_eq!(cluster.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_between_attempts() {
    let cluster = MockCluster::new();
    cluster.fail_next(3);
    let policy = CallPolicy::builder()
        .max_retries(3)
        .initial_backoff(Duration::from_millis(100))
        .max_backoff(Duration::from_secs(10))
        .multiplier(2.0)
        .jitter(0.0)
        .build()
        .unwrap();

    let start = tokio::time::Instant::now();
    PolicyExecutor::execute(&cluster, &policy, &list_command())
        .await
        .unwrap();

    // 100ms + 200ms + 400ms
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(700), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(750), "elapsed {:?}", elapsed);
}
