use std::path::PathBuf;

/// Config resolution and materialization failures. Every variant here is a
/// fatal startup error per §4.1 — there is no soft-fail path through this
/// crate.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("missing required config field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("path {path} is outside the allowed base directory")]
    InvalidPath { path: PathBuf },

    #[error("cannot write to {path}: {reason}")]
    PermissionDenied { path: PathBuf, reason: String },
}
