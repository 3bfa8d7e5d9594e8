/// Failures from the Orchestrator Client, categorized per §7's
/// Auth/Transport/Orchestrator rows.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network failure, connection refused, DNS failure, or a rate-limit
    /// wait that exceeded the operation's deadline.
    #[error("transport error during {op}: {message}")]
    Transport { op: &'static str, message: String },

    /// Two consecutive 401s after a token reload-and-retry. The Workflow
    /// Loop is expected to enter degraded mode on this.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A non-2xx, non-401 response from the orchestrator.
    #[error("orchestrator returned {status} for {op}: {body}")]
    Orchestrator {
        op: &'static str,
        status: u16,
        body: String,
    },

    /// The token-bucket rate limiter could not admit the request before
    /// its deadline.
    #[error("rate limit exceeded for {0}")]
    RateLimited(&'static str),

    /// The token file could not be read.
    #[error("failed to read token file {path}: {source}")]
    TokenIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;
