use stavily_core::AgentError;
use stavily_plugin_store::PluginError;
use stavily_sandbox::SandboxError;

/// Errors the dispatcher itself can raise, wrapping the two crates it
/// composes (§4.6). Never surfaced as a bare `Err` from `dispatch` itself —
/// folded into the terminal `InstructionResult.error` string instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// A validation-table violation (§4.6): missing URL, empty `pluginId`,
    /// missing `entrypoint`.
    #[error("{0}")]
    Validation(String),

    /// Execute preflight failed because the plugin was never installed.
    #[error("plugin not installed: {0}")]
    NotInstalled(String),
}

impl From<DispatchError> for AgentError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Plugin(PluginError::Validation(msg) | PluginError::InvalidId(msg) | PluginError::InvalidSource(msg)) => {
                Self::Validation(msg)
            },
            DispatchError::Plugin(PluginError::MissingRepositoryUrl) => Self::Validation(PluginError::MissingRepositoryUrl.to_string()),
            DispatchError::Plugin(other) => Self::Fetch(other.to_string()),
            DispatchError::Sandbox(sandbox) => Self::Sandbox(sandbox.to_string()),
            DispatchError::Validation(msg) | DispatchError::NotInstalled(msg) => Self::Validation(msg),
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
