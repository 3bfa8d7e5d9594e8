use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use stavily_core::{Instruction, LaunchSpec, RuntimeKind};

use crate::error::{PluginError, PluginResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// `detect(entrypoint, pluginDir, instructionConfig) -> LaunchSpec` (§4.4).
/// Pure aside from the `std::fs::metadata` exec-bit and directory-listing
/// checks named in the classification table; never fails to classify
/// (falls back to `Generic`), but can fail validation of
/// `pluginConfiguration.environment`.
pub fn detect(entrypoint: &str, plugin_dir: &Path, instruction: &Instruction) -> PluginResult<LaunchSpec> {
    let runtime = classify(entrypoint, plugin_dir);
    let arguments = read_arguments(instruction);
    let env = merge_environment(instruction)?;
    let timeout = resolve_timeout(instruction);
    let working_dir = plugin_dir.to_path_buf();

    let (program, args, stdin_payload) = match runtime {
        RuntimeKind::Python => (
            "python3".to_string(),
            prepend(entrypoint, arguments),
            input_payload(instruction),
        ),
        RuntimeKind::Node => (
            "node".to_string(),
            prepend(entrypoint, arguments),
            input_payload(instruction),
        ),
        RuntimeKind::Bash => ("bash".to_string(), prepend(entrypoint, arguments), None),
        RuntimeKind::Docker => (docker_tag(plugin_dir), arguments, None),
        RuntimeKind::Executable | RuntimeKind::Generic => {
            (plugin_dir.join(entrypoint).display().to_string(), arguments, None)
        },
    };

    Ok(LaunchSpec {
        runtime,
        program,
        args,
        working_dir,
        env,
        timeout,
        stdin_payload,
    })
}

/// Classification ordering (§4.4): entrypoint suffix, then exec bit, then
/// directory contents, else generic.
fn classify(entrypoint: &str, plugin_dir: &Path) -> RuntimeKind {
    if entrypoint.ends_with(".py") {
        return RuntimeKind::Python;
    }
    if entrypoint.ends_with(".js") || entrypoint.ends_with(".mjs") {
        return RuntimeKind::Node;
    }
    if entrypoint.ends_with(".sh") {
        return RuntimeKind::Bash;
    }
    if entrypoint == "Dockerfile" || entrypoint == "docker" {
        return RuntimeKind::Docker;
    }
    if is_executable(&plugin_dir.join(entrypoint)) {
        return RuntimeKind::Executable;
    }
    if plugin_dir.join("requirements.txt").exists()
        || plugin_dir.join("setup.py").exists()
        || plugin_dir.join("pyproject.toml").exists()
    {
        return RuntimeKind::Python;
    }
    if plugin_dir.join("package.json").exists() {
        return RuntimeKind::Node;
    }
    if plugin_dir.join("Dockerfile").exists() {
        return RuntimeKind::Docker;
    }
    RuntimeKind::Generic
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

fn prepend(entrypoint: &str, mut arguments: Vec<String>) -> Vec<String> {
    let mut args = Vec::with_capacity(arguments.len().saturating_add(1));
    args.push(entrypoint.to_string());
    args.append(&mut arguments);
    args
}

fn docker_tag(plugin_dir: &Path) -> String {
    let basename = plugin_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "plugin".to_string());
    format!("stavily-plugin-{basename}")
}

fn read_arguments(instruction: &Instruction) -> Vec<String> {
    instruction
        .plugin_configuration
        .get("arguments")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Environment is the process environment merged with
/// `pluginConfiguration.environment` (string-to-string; non-string values
/// rejected).
fn merge_environment(instruction: &Instruction) -> PluginResult<HashMap<String, String>> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    if let Some(overrides) = instruction.plugin_configuration.get("environment").and_then(Value::as_object) {
        for (key, value) in overrides {
            let Some(value) = value.as_str() else {
                return Err(PluginError::Validation(format!(
                    "pluginConfiguration.environment.{key} must be a string"
                )));
            };
            env.insert(key.clone(), value.to_string());
        }
    }
    Ok(env)
}

/// Timeout precedence (§4.4): `pluginConfiguration.timeout_seconds` >
/// `instruction.timeoutSeconds` > default 5 minutes.
fn resolve_timeout(instruction: &Instruction) -> Duration {
    let config_timeout = instruction
        .plugin_configuration
        .get("timeout_seconds")
        .and_then(Value::as_u64);
    config_timeout
        .or(instruction.timeout_seconds)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT)
}

/// `stdinPayload` (§4.5): only constructed for runtimes that consume an
/// `--input <path>` flag (python/node); bash and executable/generic never
/// get one per §4.4's LaunchSpec construction rules.
fn input_payload(instruction: &Instruction) -> Option<Value> {
    if instruction.input_data.is_empty() && instruction.context.is_empty() && instruction.variables.is_empty() {
        return None;
    }
    Some(json!({
        "input_data": instruction.input_data,
        "context": instruction.context,
        "variables": instruction.variables,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn instruction_with(config: Map<String, Value>) -> Instruction {
        Instruction {
            id: "i1".into(),
            plugin_id: "p1".into(),
            instruction_type: stavily_core::InstructionType::Execute,
            priority: None,
            source: None,
            plugin_configuration: config,
            input_data: Map::new(),
            context: Map::new(),
            variables: Map::new(),
            timeout_seconds: None,
            max_retries: None,
            metadata: Map::new(),
            plugin_version: None,
        }
    }

    #[test]
    fn classifies_python_by_extension() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(classify("run.py", tmp.path()), RuntimeKind::Python);
    }

    #[test]
    fn classifies_by_directory_contents_when_entrypoint_is_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("package.json"), "{}").unwrap();
        assert_eq!(classify("main", tmp.path()), RuntimeKind::Node);
    }

    #[test]
    fn falls_back_to_generic() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(classify("main", tmp.path()), RuntimeKind::Generic);
    }

    #[test]
    fn python_launch_spec_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let instr = instruction_with(Map::new());
        let spec = detect("run.py", tmp.path(), &instr).unwrap();
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["run.py".to_string()]);
    }

    #[test]
    fn bash_never_gets_stdin_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let mut instr = instruction_with(Map::new());
        instr.input_data.insert("x".into(), Value::from(1));
        let spec = detect("run.sh", tmp.path(), &instr).unwrap();
        assert!(spec.stdin_payload.is_none());
    }

    #[test]
    fn timeout_precedence_prefers_plugin_configuration() {
        let mut config = Map::new();
        config.insert("timeout_seconds".into(), Value::from(42));
        let mut instr = instruction_with(config);
        instr.timeout_seconds = Some(99);
        let tmp = tempfile::tempdir().unwrap();
        let spec = detect("run.py", tmp.path(), &instr).unwrap();
        assert_eq!(spec.timeout, Duration::from_secs(42));
    }

    #[test]
    fn rejects_non_string_environment_values() {
        let mut config = Map::new();
        let mut env_map = serde_json::Map::new();
        env_map.insert("PORT".into(), Value::from(8080));
        config.insert("environment".into(), Value::Object(env_map));
        let instr = instruction_with(config);
        let tmp = tempfile::tempdir().unwrap();
        assert!(detect("run.py", tmp.path(), &instr).is_err());
    }
}
