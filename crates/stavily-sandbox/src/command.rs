//! Builds the hygienic `tokio::process::Command` for one `LaunchSpec`:
//! environment hygiene follows the same shape as
//! `stavily_plugin_store`'s git subprocess (`env_clear()` plus only the
//! merged environment the Runtime Detector computed), and on Linux a
//! `pre_exec` hook applies Landlock confinement plus resource ceilings.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use stavily_core::{LaunchSpec, RuntimeKind};

use crate::error::{SandboxError, SandboxResult};
use crate::profile::SandboxProfile;

/// Reject an entrypoint that would resolve outside the plugin directory —
/// the first policy check the contract requires, before anything is
/// spawned.
pub(crate) fn reject_if_outside_plugin_dir(spec: &LaunchSpec) -> SandboxResult<()> {
    let candidate = match spec.runtime {
        RuntimeKind::Python | RuntimeKind::Node | RuntimeKind::Bash => {
            let Some(entrypoint) = spec.args.first() else {
                return Ok(());
            };
            spec.working_dir.join(entrypoint)
        },
        RuntimeKind::Executable | RuntimeKind::Generic => PathBuf::from(&spec.program),
        RuntimeKind::Docker => return Ok(()),
    };

    let base = canonical_or_self(&spec.working_dir);
    let resolved = canonical_or_self(&candidate);
    if resolved.starts_with(&base) {
        Ok(())
    } else {
        Err(SandboxError::EscapesPluginDir(candidate.display().to_string()))
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Build the final argument list: the Runtime Detector's own args, plus
/// `--input <path>` when a payload was written to disk for this runtime.
pub(crate) fn final_args(spec: &LaunchSpec, input_path: Option<&Path>) -> Vec<String> {
    let mut args = spec.args.clone();
    if let Some(path) = input_path {
        args.push("--input".to_string());
        args.push(path.display().to_string());
    }
    args
}

/// Build the command to spawn, including sandbox wrapping. The caller is
/// responsible for registering the Linux `pre_exec` hook (it needs to be
/// attached to this exact `Command` value, and `unsafe` is scoped to that
/// call site in `executor.rs`).
pub(crate) fn build_command(spec: &LaunchSpec, profile: &SandboxProfile, args: &[String]) -> SandboxResult<tokio::process::Command> {
    let (program, wrapped_args) = profile.wrap_command(&spec.program, args)?;

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(wrapped_args);
    cmd.current_dir(&spec.working_dir);
    cmd.env_clear();
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    cmd.env("STAVILY_NETWORK_ALLOWED", if profile.network_allowed { "1" } else { "0" });
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn spec(runtime: RuntimeKind, program: &str, args: Vec<String>, working_dir: &Path) -> LaunchSpec {
        LaunchSpec {
            runtime,
            program: program.to_string(),
            args,
            working_dir: working_dir.to_path_buf(),
            env: HashMap::new(),
            timeout: Duration::from_secs(1),
            stdin_payload: None,
        }
    }

    #[test]
    fn rejects_entrypoint_escaping_plugin_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        let escaping = spec(RuntimeKind::Python, "python3", vec!["../../etc/passwd".to_string()], &tmp.path().join("sub"));
        assert!(reject_if_outside_plugin_dir(&escaping).is_err());
    }

    #[test]
    fn allows_entrypoint_inside_plugin_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("run.py"), "print()").unwrap();
        let ok = spec(RuntimeKind::Python, "python3", vec!["run.py".to_string()], tmp.path());
        assert!(reject_if_outside_plugin_dir(&ok).is_ok());
    }

    #[test]
    fn final_args_appends_input_flag_only_when_payload_written() {
        let tmp = tempfile::tempdir().unwrap();
        let s = spec(RuntimeKind::Python, "python3", vec!["run.py".to_string()], tmp.path());
        assert_eq!(final_args(&s, None), vec!["run.py".to_string()]);
        let with_input = final_args(&s, Some(Path::new("/tmp/input.json")));
        assert_eq!(with_input, vec!["run.py".to_string(), "--input".to_string(), "/tmp/input.json".to_string()]);
    }
}
