//! Orchestrator Client (§4.2): stateless request/response for registration,
//! heartbeat, poll, update, and result submission, with retries, rate
//! limiting, and bearer-token auth with mtime-triggered reload.

mod client;
mod error;
mod rate_limit;
mod retry;
mod token;
mod types;

pub use client::{ClientConfig, OrchestratorClient};
pub use error::{ClientError, ClientResult};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use token::TokenSource;
pub use types::{
    AgentRegistration, AgentRegistrationResponse, HeartbeatState, InstructionStatus, SubmitResultResponse,
    UpdateInstructionResponse,
};
