//! Workflow Loop, Health & Metrics Aggregator, and one-shot startup
//! registration for the Stavily agent engine (§4.7-§4.9). The `stavilyd`
//! binary (`src/main.rs`) wires these together with Config & Layout, the
//! Orchestrator Client, the Plugin Store, and the Instruction Dispatcher.

mod health;
mod registration;
mod workflow;

pub use health::{HealthAggregator, HealthSnapshot};
pub use registration::register;
pub use workflow::WorkflowLoop;
