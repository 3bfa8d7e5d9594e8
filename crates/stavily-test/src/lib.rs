//! Shared test fixtures and a mock orchestrator server for the Stavily
//! agent workspace. Add as a dev-dependency and pull in what's needed:
//!
//! ```toml
//! [dev-dependencies]
//! stavily-test.workspace = true
//! ```

pub mod fixtures;
pub mod mock_orchestrator;

pub use fixtures::*;
pub use mock_orchestrator::MockOrchestrator;
