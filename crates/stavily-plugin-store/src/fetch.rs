use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use stavily_core::Instruction;
use tokio::process::Command;

use crate::error::{PluginError, PluginResult};
use crate::source::GitSource;
use crate::validate::validate_git_ref;

/// Default `gitTimeout` when the instruction doesn't override it (§4.3).
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// The ref to check out, resolved from the instruction per §4.3's
/// precedence paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefSpec {
    Tag(String),
    Branch(String),
    Commit(String),
    /// Nothing set: clone `main` explicitly.
    Default,
}

/// Resolved download plan: what ref to check out, and what to record as
/// the installed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub ref_spec: RefSpec,
    pub installed_version: Option<String>,
}

/// Resolve tag/branch/commitHash/pluginVersion precedence (§4.3): `tag` wins
/// outright; otherwise a non-empty `pluginVersion` supersedes `branch`;
/// otherwise `branch`, then `commitHash`; otherwise the default branch.
/// Every ref taken from the instruction is validated with
/// [`validate_git_ref`] before it can reach a `git` argv, the same rule
/// `source.rs` applies to the org/repo/host/path components of the
/// `github:`/`git:`/ssh shorthand grammar.
///
/// # Errors
///
/// Returns [`PluginError::InvalidSource`] if `tag`, `pluginVersion`,
/// `branch`, or `commitHash` fails ref validation.
pub fn resolve_download_plan(instruction: &Instruction) -> PluginResult<DownloadPlan> {
    if let Some(tag) = instruction.config_str("tag") {
        validate_git_ref(tag)?;
        return Ok(DownloadPlan {
            ref_spec: RefSpec::Tag(tag.to_string()),
            installed_version: Some(tag.to_string()),
        });
    }
    if let Some(version) = instruction.plugin_version.as_deref().filter(|v| !v.is_empty()) {
        validate_git_ref(version)?;
        return Ok(DownloadPlan {
            ref_spec: RefSpec::Branch(version.to_string()),
            installed_version: Some(version.to_string()),
        });
    }
    if let Some(branch) = instruction.config_str("branch") {
        validate_git_ref(branch)?;
        return Ok(DownloadPlan {
            ref_spec: RefSpec::Branch(branch.to_string()),
            installed_version: Some(branch.to_string()),
        });
    }
    if let Some(commit) = instruction
        .config_str("commit_hash")
        .or_else(|| instruction.config_str("commitHash"))
    {
        validate_git_ref(commit)?;
        return Ok(DownloadPlan {
            ref_spec: RefSpec::Commit(commit.to_string()),
            installed_version: Some(commit.to_string()),
        });
    }
    Ok(DownloadPlan {
        ref_spec: RefSpec::Default,
        installed_version: None,
    })
}

fn git_command() -> Command {
    let mut cmd = Command::new("git");
    // Clear the inherited environment so GIT_PROXY_COMMAND, GIT_EXTERNAL_DIFF
    // and similar cannot be used to run arbitrary commands from a plugin's
    // perspective; re-add only what git itself needs to function.
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
        cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
        cmd.env("HOME", home);
    }
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    cmd
}

async fn run_git(args: &[&str], cwd: Option<&Path>) -> PluginResult<()> {
    let mut cmd = git_command();
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd
        .output()
        .await
        .map_err(|e| PluginError::Clone(format!("failed to run git {args:?}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PluginError::Clone(format!("git {args:?} failed:\n{stderr}")));
    }
    Ok(())
}

/// Clone `source` into `dest` (which must not already exist) following the
/// resolved ref plan, bounded by `timeout`. On any failure, including
/// timeout, `dest` is removed before returning.
pub async fn clone_into(source: &GitSource, plan: &DownloadPlan, timeout: Duration, dest: &Path) -> PluginResult<()> {
    let url = source.clone_url();
    let result = tokio::time::timeout(timeout, clone_and_checkout(&url, &plan.ref_spec, dest)).await;

    let outcome = match result {
        Ok(inner) => inner,
        Err(_) => Err(PluginError::Timeout(timeout)),
    };

    if outcome.is_err() {
        let _ = tokio::fs::remove_dir_all(dest).await;
    }
    outcome
}

async fn clone_and_checkout(url: &str, ref_spec: &RefSpec, dest: &Path) -> PluginResult<()> {
    match ref_spec {
        RefSpec::Tag(r) | RefSpec::Branch(r) => {
            run_git(&["clone", "--depth=1", "--branch", r, url, &dest.to_string_lossy()], None).await
        },
        RefSpec::Default => run_git(&["clone", "--depth=1", "--branch", "main", url, &dest.to_string_lossy()], None).await,
        RefSpec::Commit(commit) => {
            // Arbitrary commits aren't guaranteed reachable from a shallow
            // clone, so fetch full history here and check out afterwards.
            run_git(&["clone", url, &dest.to_string_lossy()], None).await?;
            run_git(&["checkout", commit], Some(dest)).await
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use serde_json::Value;

    fn instruction_with(config: HashMap<String, Value>, plugin_version: Option<&str>) -> Instruction {
        Instruction {
            id: "i1".into(),
            plugin_id: "p1".into(),
            instruction_type: stavily_core::InstructionType::PluginInstall,
            priority: None,
            source: None,
            plugin_configuration: config,
            input_data: HashMap::new(),
            context: HashMap::new(),
            variables: HashMap::new(),
            timeout_seconds: None,
            max_retries: None,
            metadata: HashMap::new(),
            plugin_version: plugin_version.map(str::to_string),
        }
    }

    #[test]
    fn tag_wins_over_everything() {
        let mut config = HashMap::new();
        config.insert("tag".into(), Value::String("v2.0.0".into()));
        config.insert("branch".into(), Value::String("main".into()));
        let plan = resolve_download_plan(&instruction_with(config, Some("v9.9.9"))).unwrap();
        assert_eq!(plan.ref_spec, RefSpec::Tag("v2.0.0".into()));
    }

    #[test]
    fn plugin_version_supersedes_branch() {
        let mut config = HashMap::new();
        config.insert("branch".into(), Value::String("develop".into()));
        let plan = resolve_download_plan(&instruction_with(config, Some("v1.0.0"))).unwrap();
        assert_eq!(plan.ref_spec, RefSpec::Branch("v1.0.0".into()));
        assert_eq!(plan.installed_version, Some("v1.0.0".into()));
    }

    #[test]
    fn commit_hash_is_last_resort() {
        let mut config = HashMap::new();
        config.insert("commit_hash".into(), Value::String("abc123".into()));
        let plan = resolve_download_plan(&instruction_with(config, None)).unwrap();
        assert_eq!(plan.ref_spec, RefSpec::Commit("abc123".into()));
    }

    #[test]
    fn default_when_nothing_set() {
        let plan = resolve_download_plan(&instruction_with(HashMap::new(), None)).unwrap();
        assert_eq!(plan.ref_spec, RefSpec::Default);
        assert_eq!(plan.installed_version, None);
    }

    #[test]
    fn rejects_a_tag_that_looks_like_an_option_flag() {
        let mut config = HashMap::new();
        config.insert("tag".into(), Value::String("--upload-pack=evil".into()));
        assert!(resolve_download_plan(&instruction_with(config, None)).is_err());
    }

    #[test]
    fn rejects_a_path_traversal_branch() {
        let mut config = HashMap::new();
        config.insert("branch".into(), Value::String("../../etc/passwd".into()));
        assert!(resolve_download_plan(&instruction_with(config, None)).is_err());
    }

    #[test]
    fn rejects_an_unsafe_plugin_version() {
        let plan = resolve_download_plan(&instruction_with(HashMap::new(), Some("-x")));
        assert!(plan.is_err());
    }
}
