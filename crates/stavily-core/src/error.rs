/// Top-level error taxonomy, one variant per kind in §7 of the spec. Every
/// crate-local error type converts into this one at the boundary the
/// Workflow Loop consumes, mirroring the teacher's pattern of narrow,
/// per-crate error enums that fold into a shared error at the seams.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Missing required field, bad base URL, unknown config field. Fatal
    /// at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing/expired token, or a second consecutive 401. The Workflow
    /// Loop enters degraded mode (heartbeats only) and surfaces this via
    /// health.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Network failure or rate-limit timeout. Retried per operation
    /// policy; never crashes the loop.
    #[error("transport error: {0}")]
    Transport(String),

    /// Instruction missing a required field. Terminal `failed` result.
    #[error("validation error: {0}")]
    Validation(String),

    /// git clone failure or empty tree. Partial directory removed; install
    /// and instruction results both `failed`.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Unknown entrypoint extension with no executable bit. Falls back to
    /// generic; never fatal.
    #[error("runtime detection error: {0}")]
    Runtime(String),

    /// Policy denial or process crash inside the sandbox. Execution result
    /// `failed` with diagnostic in `error`.
    #[error("sandbox error: {0}")]
    Sandbox(String),

    /// Deadline elapsed. Result `failed` with `error="timeout"`; subprocess
    /// killed.
    #[error("timeout")]
    Timeout,

    /// Stop or external cancel. Result `failed` with `error="cancelled"`.
    #[error("cancelled")]
    Cancellation,

    /// 5xx on result submit, exhausted after bounded retries. Logged
    /// locally and dropped; the orchestrator is expected to re-issue.
    #[error("orchestrator error: {0}")]
    Orchestrator(String),
}

impl AgentError {
    /// The `error` string recorded on a terminal result, matching the
    /// literal values named in §7/§8 (`"timeout"`, `"cancelled"`).
    #[must_use]
    pub fn result_error_string(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::Cancellation => "cancelled".to_string(),
            other => other.to_string(),
        }
    }
}
