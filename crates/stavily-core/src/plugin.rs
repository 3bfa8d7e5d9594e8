use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What lives on disk under `data/plugins/<pluginId>/`: the cloned tree
/// plus, optionally, a recognized manifest file. Created and mutated only
/// by the Plugin Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInstallation {
    pub plugin_id: String,
    pub path: PathBuf,
    pub manifest_path: Option<PathBuf>,
}

/// The recognized manifest/entrypoint filenames the Plugin Store looks for
/// after clone (§4.3 "Structure check"). Order doesn't imply precedence —
/// the first one found on disk wins.
pub const RECOGNIZED_MANIFESTS: &[&str] = &[
    "plugin.json",
    "plugin.yaml",
    "plugin.yml",
    "manifest.json",
    "manifest.yaml",
    "manifest.yml",
    "Dockerfile",
];

/// Runtime classification produced by the Runtime Detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    Python,
    Node,
    Bash,
    Executable,
    Docker,
    Generic,
}

/// The fully resolved recipe for spawning one subprocess. Produced exactly
/// once by the Runtime Detector; consumed exactly once by the Sandbox
/// Executor.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub runtime: RuntimeKind,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
    pub stdin_payload: Option<Value>,
}
