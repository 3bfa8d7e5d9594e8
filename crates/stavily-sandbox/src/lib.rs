//! Sandbox Executor (§4.5): runs one resolved `LaunchSpec` to completion
//! under policy enforcement, returning an `ExecutionResult` that never
//! itself represents a subprocess-level failure as a Rust `Err` — timeout,
//! cancellation, non-zero exit and crashes are folded into
//! `ExecutionResult.success = false` instead. `Err` is reserved for
//! failures before a subprocess could even be attempted: a policy
//! violation, or a spawn failure.

mod command;
mod docker;
mod error;
#[cfg(target_os = "linux")]
mod linux;
mod output;
mod platform;
mod profile;

mod executor;

pub use error::{SandboxError, SandboxResult};
pub use executor::{execute, execute_with_limit};
#[cfg(target_os = "linux")]
pub use profile::LandlockPathRule;
pub use profile::{ResourceLimits, SandboxProfile};
