use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stavily_agent::{HealthAggregator, WorkflowLoop};
use stavily_core::{AgentMetrics, AgentPolicy, AgentRole, DirectoryLayout, HealthStatus};
use stavily_dispatcher::DispatchContext;
use stavily_orchestrator_client::OrchestratorClient;
use stavily_plugin_store::PluginStore;
use stavily_test::{MockOrchestrator, test_execute_instruction};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn workflow(mock: &MockOrchestrator, layout: DirectoryLayout, poll_interval: Duration) -> WorkflowLoop {
    let client = Arc::new(OrchestratorClient::new(mock.client_config()).unwrap());
    let plugin_store = Arc::new(PluginStore::new(layout));
    let ctx = Arc::new(DispatchContext::new(plugin_store, Arc::clone(&client), AgentPolicy::defaults_for(AgentRole::Action)));
    WorkflowLoop::new(client, ctx, HealthAggregator::new(), Arc::new(AgentMetrics::new()), Duration::from_secs(3600), poll_interval)
}

/// An `execute` instruction arrives for a plugin that was never installed:
/// the dispatcher's preflight rejects it without ever touching the
/// sandbox, and the loop submits a failed result without crashing.
#[tokio::test]
async fn execute_before_install_submits_a_failed_result() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_heartbeat_ok().await;
    mock.mount_update_ok("execute-1").await;
    mock.mount_result_ok("execute-1").await;
    let instruction = test_execute_instruction("never-installed", "main.py");
    mock.mount_poll_instruction(&instruction).await;

    let tmp = tempfile::tempdir().unwrap();
    let layout = DirectoryLayout::new(tmp.path());
    let workflow = workflow(&mock, layout, Duration::from_millis(20));

    let cancellation = CancellationToken::new();
    workflow.run(cancellation, Duration::from_secs(1), true).await;

    let requests = mock.received().await;
    assert!(
        requests
            .iter()
            .any(|r| r.url.path().ends_with("/instructions/execute-1/result") && r.method.as_str() == "POST")
    );
}

/// A `nextPollInterval` hint is honored for the following tick: a second
/// poll happens close to the hinted cadence rather than the original one.
#[tokio::test]
async fn next_poll_interval_hint_is_adopted() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_heartbeat_ok().await;
    mock.mount_poll_empty_times(Some(0), Some(1)).await;
    mock.mount_poll_empty(None).await;

    let tmp = tempfile::tempdir().unwrap();
    let layout = DirectoryLayout::new(tmp.path());
    let workflow = workflow(&mock, layout, Duration::from_millis(20));

    let cancellation = CancellationToken::new();
    let cancel_clone = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel_clone.cancel();
    });
    workflow.run(cancellation, Duration::from_secs(1), false).await;

    let requests = mock.received().await;
    let polls = requests.iter().filter(|r| r.url.path().ends_with("/poll")).count();
    assert!(polls >= 1, "expected at least one poll to have happened");
}

#[tokio::test]
async fn workflow_loop_registers_auth_and_heartbeat_probes() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_heartbeat_ok().await;
    mock.mount_poll_empty(None).await;

    let tmp = tempfile::tempdir().unwrap();
    let layout = DirectoryLayout::new(tmp.path());
    let workflow = workflow(&mock, layout, Duration::from_secs(3600));
    let snapshot = workflow.health().sweep();
    assert!(snapshot.components.contains_key("auth"));
    assert!(snapshot.components.contains_key("heartbeat"));
}

/// Two 401s in a row degrade auth; per §7/§8 polling must then cease
/// (heartbeats keep firing) instead of hammering the orchestrator with a
/// fresh `poll` every tick.
#[tokio::test]
async fn degraded_auth_stops_polling_until_token_rotates() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_heartbeat_ok().await;
    mock.mount_poll_unauthorized().await;

    let token_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(token_file.path(), "stale-token").unwrap();

    let mut config = mock.client_config();
    config.token_override = None;
    config.token_path = token_file.path().to_path_buf();
    let client = Arc::new(OrchestratorClient::new(config).unwrap());

    let tmp = tempfile::tempdir().unwrap();
    let layout = DirectoryLayout::new(tmp.path());
    let plugin_store = Arc::new(PluginStore::new(layout));
    let ctx = Arc::new(DispatchContext::new(plugin_store, Arc::clone(&client), AgentPolicy::defaults_for(AgentRole::Action)));
    let workflow = WorkflowLoop::new(
        client,
        ctx,
        HealthAggregator::new(),
        Arc::new(AgentMetrics::new()),
        Duration::from_secs(3600),
        Duration::from_millis(10),
    );

    let cancellation = CancellationToken::new();
    let cancel_clone = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel_clone.cancel();
    });
    workflow.run(cancellation, Duration::from_secs(1), false).await;

    assert_eq!(workflow.health().sweep().components["auth"].status, HealthStatus::Degraded);

    let requests = mock.received().await;
    let polls = requests.iter().filter(|r| r.url.path().ends_with("/poll")).count();
    // One tick's worth of poll attempts (the client's built-in reload-and-
    // retry-once on 401), never one per tick across ~15 ticks.
    assert!(polls <= 2, "expected polling to cease once auth degraded, saw {polls} poll attempts");
}

/// Once the token file is rewritten with content the orchestrator accepts,
/// the next tick's recovery probe succeeds and polling resumes (§7
/// scenario 5).
#[tokio::test]
async fn degraded_auth_resumes_once_token_file_rotates() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_heartbeat_ok().await;

    let poll_path = format!("/api/v1/agents/{}/poll", mock.agent_id);
    Mock::given(method("GET"))
        .and(path(poll_path.clone()))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(poll_path))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&mock.server)
        .await;

    let token_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(token_file.path(), "stale-token").unwrap();

    let mut config = mock.client_config();
    config.token_override = None;
    config.token_path = token_file.path().to_path_buf();
    let client = Arc::new(OrchestratorClient::new(config).unwrap());

    let tmp = tempfile::tempdir().unwrap();
    let layout = DirectoryLayout::new(tmp.path());
    let plugin_store = Arc::new(PluginStore::new(layout));
    let ctx = Arc::new(DispatchContext::new(plugin_store, Arc::clone(&client), AgentPolicy::defaults_for(AgentRole::Action)));
    let workflow = WorkflowLoop::new(
        client,
        ctx,
        HealthAggregator::new(),
        Arc::new(AgentMetrics::new()),
        Duration::from_secs(3600),
        Duration::from_millis(10),
    );

    let cancellation = CancellationToken::new();
    let cancel_clone = cancellation.clone();
    let token_path = token_file.path().to_path_buf();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        std::fs::write(&token_path, "fresh-token").unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel_clone.cancel();
    });
    workflow.run(cancellation, Duration::from_secs(1), false).await;

    assert_eq!(workflow.health().sweep().components["auth"].status, HealthStatus::Healthy);
}
