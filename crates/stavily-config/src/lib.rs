//! Config & Layout: resolves agent identity, policy, and on-disk layout
//! from a config file, sensitive environment overrides, and CLI flags;
//! materializes the directory tree on disk.

mod error;
mod file;
mod materialize;
mod overrides;
mod resolve;

pub use error::ConfigError;
pub use file::AgentFileConfig;
pub use overrides::EnvOverrides;
pub use resolve::{ConfigOverrides, OrchestratorSettings, RateLimitSettings, ResolvedConfig, RetrySettings, resolve};

pub use materialize::materialize;
