use std::path::PathBuf;

/// Errors from Plugin Store and Runtime Detector operations. Folded into
/// `stavily_core::AgentError::Fetch` / `::Validation` at the Dispatcher
/// boundary, mirroring the teacher's `PluginError -> crate boundary` shape.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// No repository URL in any of the three precedence fields.
    #[error("no repository URL in pluginConfiguration.plugin_url, pluginConfiguration.repository_url, or metadata.repository_url")]
    MissingRepositoryUrl,

    /// `GitSource::parse` rejected the URL (bad scheme, malformed shorthand).
    #[error("invalid git source: {0}")]
    InvalidSource(String),

    /// `git clone`/`git checkout` exited non-zero.
    #[error("git clone failed: {0}")]
    Clone(String),

    /// Clone timed out under `gitTimeout`.
    #[error("git clone timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Clone succeeded but the resulting directory has no entries.
    #[error("cloned plugin directory is empty: {0}")]
    EmptyClone(PathBuf),

    /// `pluginId` missing or otherwise malformed.
    #[error("invalid plugin id: {0}")]
    InvalidId(String),

    /// Plugin configuration value failed validation (e.g. non-string
    /// `environment` entry).
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O failure outside the git subprocess itself (directory removal,
    /// metadata probe).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Plugin Store / Runtime Detector operations.
pub type PluginResult<T> = Result<T, PluginError>;
