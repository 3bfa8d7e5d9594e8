//! The executor proper: policy enforcement, hygienic subprocess spawn,
//! timeout/cancellation, and result folding. The cancellation shape —
//! `tokio::select!` racing a cancellation token against a timeout-wrapped
//! wait, `None`/elapsed both treated as "stop it" — follows the same
//! pattern the teacher uses for bounding a long-running child task; the
//! SIGTERM-then-grace-then-SIGKILL sequence generalizes the teacher
//! daemon's shutdown sequence (stop background tasks, then a bounded grace
//! wait) from process-wide shutdown down to one child process.

use std::time::{Duration, Instant};

use chrono::Utc;
use stavily_core::{AgentPolicy, ExecutionResult, LaunchSpec, RuntimeKind};
use tokio_util::sync::CancellationToken;

use crate::command::{build_command, final_args, reject_if_outside_plugin_dir};
use crate::docker;
use crate::error::{SandboxError, SandboxResult};
use crate::output::{capture, fold_output_data};
use crate::profile::SandboxProfile;

const KILL_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// `execute(LaunchSpec, policy, cancellation) -> ExecutionResult` (§4.5),
/// using the default 1 MiB output cap.
pub async fn execute(
    plugin_id: &str,
    spec: LaunchSpec,
    policy: &AgentPolicy,
    cancellation: CancellationToken,
) -> SandboxResult<ExecutionResult> {
    execute_with_limit(plugin_id, spec, policy, cancellation, DEFAULT_MAX_OUTPUT_SIZE).await
}

pub async fn execute_with_limit(
    plugin_id: &str,
    spec: LaunchSpec,
    policy: &AgentPolicy,
    cancellation: CancellationToken,
    max_output_size: usize,
) -> SandboxResult<ExecutionResult> {
    reject_if_outside_plugin_dir(&spec)?;

    if spec.runtime == RuntimeKind::Docker {
        return docker::execute(plugin_id, &spec, policy, &cancellation, max_output_size).await;
    }

    let profile = SandboxProfile::from_policy(policy, spec.working_dir.clone());
    let input_path = write_input_payload(&spec).await?;

    let args = final_args(&spec, input_path.as_deref());
    let mut cmd = build_command(&spec, &profile, &args)?;
    crate::platform::register_pre_exec(&mut cmd, &profile);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| SandboxError::Spawn(e.to_string()))?;
    let stdout = child.stdout.take().expect("stdout piped in build_command");
    let stderr = child.stderr.take().expect("stderr piped in build_command");

    let (outcome, captured) = tokio::join!(
        wait_for_outcome(&mut child, spec.timeout, &cancellation),
        capture(stdout, stderr, max_output_size),
    );

    if let Some(path) = &input_path {
        let _ = tokio::fs::remove_file(path).await;
    }

    Ok(build_result(plugin_id, outcome, captured, start.elapsed(), max_output_size))
}

async fn write_input_payload(spec: &LaunchSpec) -> SandboxResult<Option<std::path::PathBuf>> {
    let Some(payload) = &spec.stdin_payload else {
        return Ok(None);
    };
    let path = spec.working_dir.join(format!(".stavily-input-{}.json", std::process::id()));
    tokio::fs::write(&path, serde_json::to_vec(payload)?).await?;
    Ok(Some(path))
}

enum Outcome {
    Exited(std::process::ExitStatus),
    TimedOut,
    Cancelled,
    WaitFailed(String),
}

async fn wait_for_outcome(child: &mut tokio::process::Child, timeout: Duration, cancellation: &CancellationToken) -> Outcome {
    let outcome = tokio::select! {
        biased;
        () = cancellation.cancelled() => Outcome::Cancelled,
        result = tokio::time::timeout(timeout, child.wait()) => match result {
            Ok(Ok(status)) => Outcome::Exited(status),
            Ok(Err(e)) => Outcome::WaitFailed(e.to_string()),
            Err(_) => Outcome::TimedOut,
        },
    };

    if matches!(outcome, Outcome::Cancelled | Outcome::TimedOut) {
        terminate(child).await;
    }
    outcome
}

/// SIGTERM, then a 5-second grace period, then SIGKILL (§4.5).
async fn terminate(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            let pid = nix::unistd::Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

fn build_result(plugin_id: &str, outcome: Outcome, captured: crate::output::CapturedOutput, elapsed: Duration, max_output_size: usize) -> ExecutionResult {
    let mut logs: Vec<String> = captured.combined_log.lines().map(str::to_string).collect();
    if captured.truncated {
        logs.push(format!("output truncated at {max_output_size} bytes"));
    }

    let (success, exit_code, error) = match outcome {
        Outcome::Exited(status) => {
            let code = status.code().unwrap_or(-1);
            if status.success() {
                (true, code, None)
            } else {
                (false, code, Some(format!("exit code {code}")))
            }
        },
        Outcome::TimedOut => (false, -1, Some("timeout".to_string())),
        Outcome::Cancelled => (false, -1, Some("cancelled".to_string())),
        Outcome::WaitFailed(msg) => (false, -1, Some(msg)),
    };

    ExecutionResult {
        plugin_id: plugin_id.to_string(),
        success,
        output_data: fold_output_data(&captured.stdout),
        logs,
        exit_code,
        duration_seconds: elapsed.as_secs_f64(),
        timestamp: Utc::now(),
        error,
    }
}
