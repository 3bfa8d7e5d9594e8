use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::instruction::{Instruction, InstructionType};
use crate::log::ExecutionLog;

/// Produced by the Sandbox Executor; folded into an [`InstructionResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub plugin_id: String,
    pub success: bool,
    #[serde(default)]
    pub output_data: HashMap<String, Value>,
    pub logs: Vec<String>,
    pub exit_code: i32,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Produced by the Plugin Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationResult {
    pub plugin_id: String,
    pub success: bool,
    #[serde(default)]
    pub installed_path: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub logs: Vec<String>,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The wrapper surfaced to the orchestrator for one dispatched instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionResult {
    pub instruction_id: String,
    #[serde(rename = "type")]
    pub instruction_type: InstructionType,
    pub success: bool,
    #[serde(default)]
    pub install_result: Option<InstallationResult>,
    #[serde(default)]
    pub execution_result: Option<ExecutionResult>,
    pub processing_logs: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Mutable agent state, owned exclusively by the Workflow Loop. The
/// presence of `current_instruction` is the mutex enforcing at-most-one
/// active instruction (§5).
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub running: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub current_instruction: Option<Instruction>,
    pub execution_log: ExecutionLog,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            running: false,
            start_time: None,
            current_instruction: None,
            execution_log: ExecutionLog::new(),
        }
    }
}

impl WorkflowState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_active_instruction(&self) -> bool {
        self.current_instruction.is_some()
    }
}
