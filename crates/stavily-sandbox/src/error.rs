/// Errors that stop the Sandbox Executor before it can produce an
/// `ExecutionResult` at all: policy rejection, spawn failure, I/O around
/// the working directory. Outcomes the subprocess itself reports — timeout,
/// cancellation, non-zero exit, a crash — are folded into
/// `ExecutionResult.success = false` instead, per the sandbox contract.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("entrypoint resolves outside the plugin directory: {0}")]
    EscapesPluginDir(String),

    #[error("failed to apply sandbox profile: {0}")]
    Profile(String),

    #[error("failed to spawn sandboxed process: {0}")]
    Spawn(String),

    #[error("docker build failed: {0}")]
    DockerBuild(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SandboxResult<T> = Result<T, SandboxError>;
