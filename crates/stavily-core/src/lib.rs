//! Shared data model, error taxonomy, and health vocabulary for the Stavily
//! agent engine. Every other `stavily-*` crate depends on this one; it has
//! no dependencies on its siblings.

mod error;
mod health;
mod identity;
mod instruction;
mod layout;
mod log;
mod plugin;
mod policy;
mod result;

pub use error::AgentError;
pub use health::{AgentMetrics, ComponentHealth, HealthStatus};
pub use identity::{AgentIdentity, AgentRole};
pub use instruction::{Instruction, InstructionType, PollResponse};
pub use layout::DirectoryLayout;
pub use log::ExecutionLog;
pub use plugin::{LaunchSpec, PluginInstallation, RuntimeKind, RECOGNIZED_MANIFESTS};
pub use policy::AgentPolicy;
pub use result::{ExecutionResult, InstallationResult, InstructionResult, WorkflowState};
