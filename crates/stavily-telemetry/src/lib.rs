//! Logging and tracing setup for the Stavily agent engine.
//!
//! ```rust,no_run
//! use stavily_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), stavily_telemetry::TelemetryError> {
//! let config = LogConfig::new("info").with_format(LogFormat::Compact);
//! setup_logging(&config)?;
//! tracing::info!("agent starting");
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
