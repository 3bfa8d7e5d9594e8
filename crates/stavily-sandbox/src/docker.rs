//! Two-phase Docker executor (§4.5): build the plugin's image, then run
//! it. A build failure is reported as `success = false` with the build
//! output folded into `logs`, never a spawn-time error — the contract
//! treats "the Dockerfile doesn't build" the same as any other plugin
//! failure, not an executor fault.

use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use stavily_core::{AgentPolicy, ExecutionResult, LaunchSpec};
use tokio_util::sync::CancellationToken;

use crate::error::{SandboxError, SandboxResult};
use crate::output::capture;
use crate::output::fold_output_data;

struct StepResult {
    success: bool,
    exit_code: i32,
    stdout: String,
    logs: Vec<String>,
    error: Option<String>,
}

pub(crate) async fn execute(
    plugin_id: &str,
    spec: &LaunchSpec,
    policy: &AgentPolicy,
    cancellation: &CancellationToken,
    max_output_size: usize,
) -> SandboxResult<ExecutionResult> {
    let start = Instant::now();
    let tag = spec.program.clone();

    let build = run_step(
        &["build", "-t", &tag, "."],
        &spec.working_dir,
        spec.timeout,
        cancellation,
        max_output_size,
    )
    .await?;

    if !build.success {
        return Ok(ExecutionResult {
            plugin_id: plugin_id.to_string(),
            success: false,
            output_data: std::collections::HashMap::new(),
            logs: build.logs,
            exit_code: build.exit_code,
            duration_seconds: start.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
            error: Some(build.error.unwrap_or_else(|| "docker build failed".to_string())),
        });
    }

    let run_args = build_run_args(&tag, spec, policy);
    let run_args_ref: Vec<&str> = run_args.iter().map(String::as_str).collect();

    let run = run_step(&run_args_ref, &spec.working_dir, spec.timeout, cancellation, max_output_size).await?;

    let mut logs = build.logs;
    logs.extend(run.logs);

    Ok(ExecutionResult {
        plugin_id: plugin_id.to_string(),
        success: run.success,
        output_data: fold_output_data(&run.stdout),
        logs,
        exit_code: run.exit_code,
        duration_seconds: start.elapsed().as_secs_f64(),
        timestamp: Utc::now(),
        error: run.error,
    })
}

/// Build `docker run`'s argv per §4.4: `--rm`, an optional `--network
/// none` when the policy denies network, one `-e KEY=VALUE` per entry in
/// the Runtime Detector's merged environment (which already carries
/// `pluginConfiguration.environment` overrides) plus the network-denial
/// advisory marker, then the image tag and the spec's own args.
fn build_run_args(tag: &str, spec: &LaunchSpec, policy: &AgentPolicy) -> Vec<String> {
    let mut run_args = vec!["run".to_string(), "--rm".to_string()];
    if !policy.network_allowed {
        run_args.push("--network".to_string());
        run_args.push("none".to_string());
    }
    for (key, value) in &spec.env {
        run_args.push("-e".to_string());
        run_args.push(format!("{key}={value}"));
    }
    run_args.push("-e".to_string());
    run_args.push(format!("STAVILY_NETWORK_ALLOWED={}", if policy.network_allowed { "1" } else { "0" }));
    run_args.push(tag.to_string());
    run_args.extend(spec.args.clone());
    run_args
}

async fn run_step(
    args: &[&str],
    cwd: &std::path::Path,
    timeout: Duration,
    cancellation: &CancellationToken,
    max_output_size: usize,
) -> SandboxResult<StepResult> {
    let mut cmd = tokio::process::Command::new("docker");
    cmd.args(args);
    cmd.current_dir(cwd);
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
        cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
        cmd.env("HOME", home);
    }
    if let Ok(docker_host) = std::env::var("DOCKER_HOST") {
        cmd.env("DOCKER_HOST", docker_host);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| SandboxError::Spawn(e.to_string()))?;
    let stdout = child.stdout.take().expect("stdout piped above");
    let stderr = child.stderr.take().expect("stderr piped above");

    let wait = async {
        tokio::select! {
            biased;
            () = cancellation.cancelled() => None,
            result = tokio::time::timeout(timeout, child.wait()) => result.ok().and_then(Result::ok),
        }
    };
    let (status, captured) = tokio::join!(wait, capture(stdout, stderr, max_output_size));

    if status.is_none() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }

    let mut logs: Vec<String> = captured.combined_log.lines().map(str::to_string).collect();
    if captured.truncated {
        logs.push(format!("output truncated at {max_output_size} bytes"));
    }

    let (success, exit_code, error) = match status {
        Some(status) => {
            let code = status.code().unwrap_or(-1);
            if status.success() { (true, code, None) } else { (false, code, Some(format!("exit code {code}"))) }
        },
        None => (false, -1, Some("timeout".to_string())),
    };

    Ok(StepResult {
        success,
        exit_code,
        stdout: captured.stdout,
        logs,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use stavily_core::{AgentRole, RuntimeKind};

    fn spec(env: HashMap<String, String>) -> LaunchSpec {
        LaunchSpec {
            runtime: RuntimeKind::Docker,
            program: "plugin:latest".to_string(),
            args: vec!["run".to_string()],
            working_dir: PathBuf::from("."),
            env,
            timeout: Duration::from_secs(1),
            stdin_payload: None,
        }
    }

    #[test]
    fn env_entries_become_dash_e_pairs() {
        let mut env = HashMap::new();
        env.insert("PLUGIN_TOKEN".to_string(), "secret".to_string());
        let policy = AgentPolicy::defaults_for(AgentRole::Action);
        let args = build_run_args("plugin:latest", &spec(env), &policy);
        assert!(args.contains(&"-e".to_string()));
        assert!(args.contains(&"PLUGIN_TOKEN=secret".to_string()));
    }

    #[test]
    fn network_allowed_marker_is_one() {
        let policy = AgentPolicy::defaults_for(AgentRole::Action);
        assert!(policy.network_allowed);
        let args = build_run_args("plugin:latest", &spec(HashMap::new()), &policy);
        assert!(args.contains(&"STAVILY_NETWORK_ALLOWED=1".to_string()));
        assert!(!args.contains(&"--network".to_string()));
    }

    #[test]
    fn network_denied_adds_network_none_and_zero_marker() {
        let policy = AgentPolicy::defaults_for(AgentRole::Sensor);
        assert!(!policy.network_allowed);
        let args = build_run_args("plugin:latest", &spec(HashMap::new()), &policy);
        assert!(args.contains(&"STAVILY_NETWORK_ALLOWED=0".to_string()));
        let none_idx = args.iter().position(|a| a == "none").unwrap();
        assert_eq!(args[none_idx - 1], "--network");
    }

    #[test]
    fn tag_and_args_come_last_in_order() {
        let policy = AgentPolicy::defaults_for(AgentRole::Action);
        let args = build_run_args("plugin:latest", &spec(HashMap::new()), &policy);
        let tag_idx = args.iter().position(|a| a == "plugin:latest").unwrap();
        assert_eq!(&args[tag_idx + 1..], &["run".to_string()]);
    }
}
