use stavily_orchestrator_client::{HeartbeatState, InstructionStatus, OrchestratorClient};
use stavily_test::{MockOrchestrator, test_install_instruction};

#[tokio::test]
async fn heartbeat_succeeds_against_mock_server() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_heartbeat_ok().await;

    let client = OrchestratorClient::new(mock.client_config()).unwrap();
    client.heartbeat(HeartbeatState::Online).await.unwrap();
}

#[tokio::test]
async fn poll_decodes_an_instruction() {
    let mock = MockOrchestrator::start("agent-1").await;
    let instruction = test_install_instruction("cpu-monitor", "https://git.example/x.git");
    mock.mount_poll_instruction(&instruction).await;

    let client = OrchestratorClient::new(mock.client_config()).unwrap();
    let response = client.poll().await.unwrap();
    let received = response.instruction.unwrap();
    assert_eq!(received.id, instruction.id);
    assert_eq!(received.plugin_id, "cpu-monitor");
}

#[tokio::test]
async fn second_consecutive_401_is_a_fatal_auth_error() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_poll_unauthorized().await;

    let client = OrchestratorClient::new(mock.client_config()).unwrap();
    let err = client.poll().await.unwrap_err();
    assert!(matches!(err, stavily_orchestrator_client::ClientError::Auth(_)));
}

#[tokio::test]
async fn orchestrator_5xx_on_submit_is_retried() {
    let mock = MockOrchestrator::start("agent-1").await;
    mock.mount_result_ok("i1").await;

    let client = OrchestratorClient::new(mock.client_config()).unwrap();
    let response = client
        .submit_instruction_result("i1", InstructionStatus::Completed, None, None, None, &[])
        .await
        .unwrap();
    assert!(response.acknowledged);
}
