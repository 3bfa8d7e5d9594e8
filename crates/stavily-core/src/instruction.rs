use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The type of work an [`Instruction`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstructionType {
    PluginInstall,
    PluginUpdate,
    Execute,
}

/// The unit of work from the orchestrator. Arrives embedded in a
/// [`PollResponse`]; mutated only by the Instruction Dispatcher; destroyed
/// after result submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub id: String,
    pub plugin_id: String,
    #[serde(rename = "type")]
    pub instruction_type: InstructionType,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub plugin_configuration: HashMap<String, Value>,
    #[serde(default)]
    pub input_data: HashMap<String, Value>,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub plugin_version: Option<String>,
}

impl Instruction {
    /// Read a string field out of `pluginConfiguration`, treating an empty
    /// string the same as absent (§3 invariants require "present and
    /// non-empty").
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.plugin_configuration
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Read a string field out of `metadata`, same non-empty rule as
    /// [`Instruction::config_str`].
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Resolve the repository URL by the precedence rule in §4.3:
    /// `pluginConfiguration.plugin_url` > `pluginConfiguration.repository_url`
    /// > `metadata.repository_url`.
    #[must_use]
    pub fn repository_url(&self) -> Option<&str> {
        self.config_str("plugin_url")
            .or_else(|| self.config_str("repository_url"))
            .or_else(|| self.metadata_str("repository_url"))
    }

    /// Resolve the entrypoint for an `execute` instruction.
    #[must_use]
    pub fn entrypoint(&self) -> Option<&str> {
        self.config_str("entrypoint")
    }
}

/// The orchestrator's answer to a poll. `next_poll_interval` is a server
/// hint in seconds; the Workflow Loop honors it as the new cadence on the
/// next tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    #[serde(default)]
    pub instruction: Option<Instruction>,
    pub status: String,
    #[serde(default)]
    pub next_poll_interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(config: HashMap<String, Value>) -> Instruction {
        Instruction {
            id: "i1".into(),
            plugin_id: "p1".into(),
            instruction_type: InstructionType::PluginInstall,
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

    #[test]
    fn repository_url_precedence_prefers_plugin_url() {
        let mut config = HashMap::new();
        config.insert("plugin_url".into(), Value::String("https://a".into()));
        config.insert("repository_url".into(), Value::String("https://b".into()));
        let instr = instruction(config);
        assert_eq!(instr.repository_url(), Some("https://a"));
    }

    #[test]
    fn repository_url_falls_back_to_metadata() {
        let mut instr = instruction(HashMap::new());
        instr
            .metadata
            .insert("repository_url".into(), Value::String("https://c".into()));
        assert_eq!(instr.repository_url(), Some("https://c"));
    }

    #[test]
    fn empty_string_is_treated_as_absent() {
        let mut config = HashMap::new();
        config.insert("plugin_url".into(), Value::String(String::new()));
        let instr = instruction(config);
        assert_eq!(instr.repository_url(), None);
    }

    #[test]
    fn instruction_type_serializes_camel_case() {
        let json = serde_json::to_string(&InstructionType::PluginInstall).unwrap();
        assert_eq!(json, "\"pluginInstall\"");
    }
}
