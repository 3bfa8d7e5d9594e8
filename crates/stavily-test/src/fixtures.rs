//! Test fixtures for the core domain types.

use std::collections::HashMap;

use serde_json::Value;
use stavily_core::{AgentIdentity, AgentRole, Instruction, InstructionType};

/// Build an [`Instruction`] with the given id, plugin id, type, and
/// `pluginConfiguration` map, leaving every other field at its default
/// (absent). Every fixture below is a thin wrapper around this one.
#[must_use]
pub fn test_instruction(
    id: impl Into<String>,
    plugin_id: impl Into<String>,
    instruction_type: InstructionType,
    plugin_configuration: HashMap<String, Value>,
) -> Instruction {
    Instruction {
        id: id.into(),
        plugin_id: plugin_id.into(),
        instruction_type,
        priority: None,
        source: None,
        plugin_configuration,
        input_data: HashMap::new(),
        context: HashMap::new(),
        variables: HashMap::new(),
        timeout_seconds: None,
        max_retries: None,
        metadata: HashMap::new(),
        plugin_version: None,
    }
}

/// A `pluginInstall` instruction pointing `plugin_url` at `repository_url`.
#[must_use]
pub fn test_install_instruction(plugin_id: impl Into<String>, repository_url: impl Into<String>) -> Instruction {
    let mut config = HashMap::new();
    config.insert("plugin_url".to_string(), Value::String(repository_url.into()));
    test_instruction("install-1", plugin_id, InstructionType::PluginInstall, config)
}

/// A `pluginInstall` instruction carrying `pluginVersion`, which overrides
/// `branch` per §3's invariant.
#[must_use]
pub fn test_install_instruction_with_version(
    plugin_id: impl Into<String>,
    repository_url: impl Into<String>,
    version: impl Into<String>,
) -> Instruction {
    let mut instr = test_install_instruction(plugin_id, repository_url);
    instr.plugin_version = Some(version.into());
    instr
}

/// An `execute` instruction naming `entrypoint`.
#[must_use]
pub fn test_execute_instruction(plugin_id: impl Into<String>, entrypoint: impl Into<String>) -> Instruction {
    let mut config = HashMap::new();
    config.insert("entrypoint".to_string(), Value::String(entrypoint.into()));
    test_instruction("execute-1", plugin_id, InstructionType::Execute, config)
}

/// An `execute` instruction naming `entrypoint` and carrying `input_data`.
#[must_use]
pub fn test_execute_instruction_with_input(
    plugin_id: impl Into<String>,
    entrypoint: impl Into<String>,
    input_data: HashMap<String, Value>,
) -> Instruction {
    let mut instr = test_execute_instruction(plugin_id, entrypoint);
    instr.input_data = input_data;
    instr
}

/// A Sensor identity with a fixed id, handy for tests asserting on
/// outbound request paths (`/agents/{id}/...`).
#[must_use]
pub fn test_sensor_identity() -> AgentIdentity {
    AgentIdentity::new("agent-1".to_string(), AgentRole::Sensor, "org-1".to_string(), "0.1.0".to_string())
}

/// An Action identity with a fixed id.
#[must_use]
pub fn test_action_identity() -> AgentIdentity {
    AgentIdentity::new("agent-1".to_string(), AgentRole::Action, "org-1".to_string(), "0.1.0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_instruction_carries_plugin_url() {
        let instr = test_install_instruction("p1", "https://git.example/x.git");
        assert_eq!(instr.repository_url(), Some("https://git.example/x.git"));
    }

    #[test]
    fn install_instruction_with_version_overrides_branch() {
        let instr = test_install_instruction_with_version("p1", "https://git.example/x.git", "v1.2.0");
        assert_eq!(instr.plugin_version.as_deref(), Some("v1.2.0"));
    }

    #[test]
    fn execute_instruction_carries_entrypoint() {
        let instr = test_execute_instruction("p1", "main.py");
        assert_eq!(instr.entrypoint(), Some("main.py"));
    }

    #[test]
    fn identities_carry_the_requested_role() {
        assert_eq!(test_sensor_identity().role, AgentRole::Sensor);
        assert_eq!(test_action_identity().role, AgentRole::Action);
    }
}
