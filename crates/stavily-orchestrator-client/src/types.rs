use serde::{Deserialize, Serialize};
use serde_json::Value;
use stavily_core::Instruction;

/// Agent heartbeat state reported to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatState {
    Online,
    Offline,
}

#[derive(Debug, Serialize)]
pub(crate) struct HeartbeatRequest {
    pub state: HeartbeatState,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollResponseWire {
    #[serde(default)]
    pub instruction: Option<Instruction>,
    pub status: String,
    #[serde(default)]
    pub next_poll_interval: Option<u64>,
}

/// Status reported via `updateInstruction` mid-dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionStatus {
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateInstructionRequest<'a> {
    pub status: InstructionStatus,
    pub execution_log: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct UpdateInstructionResponse {
    pub updated_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResultRequest<'a> {
    pub status: InstructionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<&'a Value>,
    pub execution_log: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct SubmitResultResponse {
    pub acknowledged: bool,
    pub instruction_id: String,
}

/// Registration payload for `POST /api/v1/agents` (§6). Issued once at
/// startup, before the heartbeat/poll loop begins.
#[derive(Debug, Serialize)]
pub struct AgentRegistration<'a> {
    pub id: &'a str,
    pub name: &'a str,
    #[serde(rename = "type")]
    pub agent_type: &'a str,
    pub organization_id: &'a str,
    pub version: &'a str,
    pub hostname: &'a str,
    pub platform: &'a str,
    pub arch: &'a str,
    pub capabilities: Vec<String>,
    pub config: Value,
}

#[derive(Debug, Deserialize)]
pub struct AgentRegistrationResponse {
    pub agent_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
}
