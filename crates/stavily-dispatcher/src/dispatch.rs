use chrono::{DateTime, Utc};
use stavily_core::{ExecutionLog, ExecutionResult, InstallationResult, Instruction, InstructionResult, InstructionType};
use stavily_orchestrator_client::InstructionStatus;
use stavily_plugin_store::PluginResult;
use tokio_util::sync::CancellationToken;

use crate::context::DispatchContext;
use crate::error::DispatchError;

/// Non-terminal states named in §4.6's machine. `Received` and the three
/// terminal states (`rejected`/`failed`/`completed`) never reach
/// [`advance`] — only intermediate transitions emit `updateInstruction`.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Validating,
    Dispatching,
    Installing,
    Updating,
    Preflight,
    Executing,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Dispatching => "dispatching",
            Self::Installing => "installing",
            Self::Updating => "updating",
            Self::Preflight => "preflight",
            Self::Executing => "executing",
        }
    }
}

/// `dispatch(instruction, cancellation) -> InstructionResult` (§4.6). Never
/// returns an `Err`: every failure this function can observe is folded
/// into a terminal `InstructionResult` with `success = false`.
pub async fn dispatch(ctx: &DispatchContext, instruction: &Instruction, cancellation: &CancellationToken) -> InstructionResult {
    let start = Utc::now();
    let mut log = ExecutionLog::new();
    log.push(format!(
        "received instruction {} (type={:?}, plugin={})",
        instruction.id, instruction.instruction_type, instruction.plugin_id
    ));

    advance(ctx, instruction, &mut log, Stage::Validating).await;
    if let Err(err) = validate(instruction) {
        log.push(format!("validation failed: {err}"));
        return terminal(instruction, false, None, None, log, start, Some(err.to_string()));
    }

    advance(ctx, instruction, &mut log, Stage::Dispatching).await;

    match instruction.instruction_type {
        InstructionType::PluginInstall => run_install(ctx, instruction, &mut log, start).await,
        InstructionType::PluginUpdate => run_update(ctx, instruction, &mut log, start).await,
        InstructionType::Execute => run_execute(ctx, instruction, &mut log, start, cancellation).await,
    }
}

/// Validation table (§4.6). `InstructionType` is a closed enum, so "any
/// other type is rejected" is enforced structurally by exhaustive
/// matching/deserialization rather than a runtime default arm.
fn validate(instruction: &Instruction) -> Result<(), DispatchError> {
    match instruction.instruction_type {
        InstructionType::PluginInstall | InstructionType::PluginUpdate => {
            if instruction.repository_url().is_none() {
                return Err(DispatchError::Validation(format!(
                    "no repository URL for plugin {}",
                    instruction.plugin_id
                )));
            }
            if instruction.plugin_id.trim().is_empty() {
                return Err(DispatchError::Validation("pluginId must be non-empty".to_string()));
            }
            Ok(())
        },
        InstructionType::Execute => {
            if instruction.entrypoint().is_none() {
                return Err(DispatchError::Validation(format!(
                    "no entrypoint for plugin {}",
                    instruction.plugin_id
                )));
            }
            Ok(())
        },
    }
}

async fn run_install(ctx: &DispatchContext, instruction: &Instruction, log: &mut ExecutionLog, start: DateTime<Utc>) -> InstructionResult {
    log.push("Starting plugin installation".to_string());
    advance(ctx, instruction, log, Stage::Installing).await;
    let result = ctx.plugin_store.install(instruction).await;
    finish_install(instruction, log, start, result)
}

async fn run_update(ctx: &DispatchContext, instruction: &Instruction, log: &mut ExecutionLog, start: DateTime<Utc>) -> InstructionResult {
    log.push("Starting plugin installation".to_string());
    advance(ctx, instruction, log, Stage::Updating).await;
    let result = ctx.plugin_store.update(instruction).await;
    finish_install(instruction, log, start, result)
}

fn finish_install(
    instruction: &Instruction,
    log: &mut ExecutionLog,
    start: DateTime<Utc>,
    result: PluginResult<InstallationResult>,
) -> InstructionResult {
    match result {
        Ok(install) => {
            log.extend(install.logs.clone());
            log.push("Plugin installation completed successfully".to_string());
            terminal(instruction, true, Some(install), None, log.clone(), start, None)
        },
        Err(err) => {
            let dispatch_err = DispatchError::from(err);
            log.push(format!("plugin installation failed: {dispatch_err}"));
            terminal(instruction, false, None, None, log.clone(), start, Some(dispatch_err.to_string()))
        },
    }
}

async fn run_execute(
    ctx: &DispatchContext,
    instruction: &Instruction,
    log: &mut ExecutionLog,
    start: DateTime<Utc>,
    cancellation: &CancellationToken,
) -> InstructionResult {
    if !ctx.plugin_store.is_installed(&instruction.plugin_id) {
        let err = DispatchError::NotInstalled(instruction.plugin_id.clone());
        log.push(err.to_string());
        return terminal(instruction, false, None, None, log.clone(), start, Some(err.to_string()));
    }

    advance(ctx, instruction, log, Stage::Preflight).await;

    // Validated non-empty by `validate`.
    let entrypoint = instruction.entrypoint().expect("execute instruction has an entrypoint");
    let plugin_dir = ctx.plugin_store.path(&instruction.plugin_id);

    let spec = match stavily_plugin_store::detect(entrypoint, &plugin_dir, instruction) {
        Ok(spec) => spec,
        Err(err) => {
            let dispatch_err = DispatchError::from(err);
            log.push(format!("runtime detection failed: {dispatch_err}"));
            return terminal(instruction, false, None, None, log.clone(), start, Some(dispatch_err.to_string()));
        },
    };

    log.push("Starting plugin execution".to_string());
    advance(ctx, instruction, log, Stage::Executing).await;

    let outcome = stavily_sandbox::execute(&instruction.plugin_id, spec, &ctx.policy, cancellation.clone()).await;
    finish_execute(instruction, log, start, outcome)
}

fn finish_execute(
    instruction: &Instruction,
    log: &mut ExecutionLog,
    start: DateTime<Utc>,
    outcome: stavily_sandbox::SandboxResult<ExecutionResult>,
) -> InstructionResult {
    match outcome {
        Ok(result) => {
            log.extend(result.logs.clone());
            if result.success {
                log.push("Plugin execution completed successfully".to_string());
            } else {
                log.push(format!(
                    "plugin execution failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ));
            }
            let success = result.success;
            let error = result.error.clone();
            terminal(instruction, success, None, Some(result), log.clone(), start, error)
        },
        Err(err) => {
            let dispatch_err = DispatchError::from(err);
            log.push(format!("sandbox error: {dispatch_err}"));
            terminal(instruction, false, None, None, log.clone(), start, Some(dispatch_err.to_string()))
        },
    }
}

/// Record a non-terminal transition and best-effort notify the
/// orchestrator (§4.6: "transitions ... emit an `updateInstruction` call").
/// Failures here are logged, never fatal to the dispatch itself — the
/// terminal result submission is what the orchestrator actually relies on.
async fn advance(ctx: &DispatchContext, instruction: &Instruction, log: &mut ExecutionLog, stage: Stage) {
    log.push(format!("-> {}", stage.as_str()));
    if let Err(err) = ctx
        .orchestrator
        .update_instruction(&instruction.id, InstructionStatus::Executing, &log.snapshot())
        .await
    {
        tracing::warn!(instruction_id = %instruction.id, stage = stage.as_str(), error = %err, "updateInstruction failed, continuing locally");
    }
}

#[allow(clippy::too_many_arguments)]
fn terminal(
    instruction: &Instruction,
    success: bool,
    install_result: Option<InstallationResult>,
    execution_result: Option<ExecutionResult>,
    log: ExecutionLog,
    start: DateTime<Utc>,
    error: Option<String>,
) -> InstructionResult {
    let end = Utc::now();
    #[allow(clippy::cast_precision_loss)]
    let duration_seconds = end.signed_duration_since(start).num_milliseconds().max(0) as f64 / 1000.0;
    InstructionResult {
        instruction_id: instruction.id.clone(),
        instruction_type: instruction.instruction_type,
        success,
        install_result,
        execution_result,
        processing_logs: log.snapshot(),
        start_time: start,
        end_time: end,
        duration_seconds,
        error,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_json::Value;
    use stavily_core::{AgentPolicy, AgentRole, DirectoryLayout, InstructionType};
    use std::time::Duration;

    use stavily_orchestrator_client::{ClientConfig, OrchestratorClient, RetryPolicy};
    use stavily_plugin_store::PluginStore;

    use super::*;

    fn instruction(instruction_type: InstructionType, config: HashMap<String, Value>) -> Instruction {
        Instruction {
            id: "i1".into(),
            plugin_id: "p1".into(),
            instruction_type,
            priority: None,
            source: None,
            plugin_configuration: config,
            input_data: HashMap::new(),
            context: HashMap::new(),
            variables: HashMap::new(),
            timeout_seconds: None,
            max_retries: None,
            metadata: HashMap::new(),
            plugin_version: None,
        }
    }

    fn test_context(base_dir: &std::path::Path) -> DispatchContext {
        let layout = DirectoryLayout::new(base_dir);
        let store = Arc::new(PluginStore::new(layout));
        let client = OrchestratorClient::new(ClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            agent_id: "agent-1".to_string(),
            token_path: base_dir.join("agent.jwt"),
            token_override: Some("test-token".to_string()),
            retry: RetryPolicy::new(1, Duration::from_millis(1)),
            rate_limit_burst: 10,
            rate_limit_per_second: 10.0,
        })
        .unwrap();
        DispatchContext::new(store, Arc::new(client), AgentPolicy::defaults_for(AgentRole::Action))
    }

    #[tokio::test]
    async fn rejects_install_without_repository_url() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path());
        let instr = instruction(InstructionType::PluginInstall, HashMap::new());
        let result = dispatch(&ctx, &instr, &CancellationToken::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("repository URL"));
        assert!(result.install_result.is_none());
    }

    #[tokio::test]
    async fn execute_without_install_fails_without_auto_installing() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path());
        let mut config = HashMap::new();
        config.insert("entrypoint".to_string(), Value::String("run.py".to_string()));
        let instr = instruction(InstructionType::Execute, config);
        let result = dispatch(&ctx, &instr, &CancellationToken::new()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("plugin not installed: p1"));
        assert!(!ctx.plugin_store.is_installed("p1"));
    }

    #[tokio::test]
    async fn execute_rejected_without_entrypoint() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path());
        let instr = instruction(InstructionType::Execute, HashMap::new());
        let result = dispatch(&ctx, &instr, &CancellationToken::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("entrypoint"));
    }
}
