//! Logging setup: configuration and subscriber construction.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, human-readable.
    Compact,
    /// Multi-line, verbose, for local debugging.
    Pretty,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

/// Where log output additionally goes, beyond stdout.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Only stdout.
    Stdout,
    /// Stdout plus a rolling file appender rooted at this directory,
    /// writing `agent.log` (§6's on-disk layout names the path; this is
    /// the writer that realizes it).
    StdoutAndFile(PathBuf),
}

/// Logging configuration, built up fluently and passed to
/// [`setup_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    format: LogFormat,
    target: LogTarget,
    directives: Vec<String>,
}

impl LogConfig {
    /// Start from a base level filter (`"info"`, `"debug"`, ...).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Compact,
            target: LogTarget::Stdout,
            directives: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_file(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.target = LogTarget::StdoutAndFile(logs_dir.into());
        self
    }

    /// Add a per-target directive, e.g. `"stavily_plugin_store=trace"`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::Config(format!("invalid level '{}': {e}", self.level)))?;
        for directive in &self.directives {
            let parsed = directive
                .parse()
                .map_err(|e| TelemetryError::Config(format!("invalid directive '{directive}': {e}")))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install a global `tracing` subscriber built from `config`. May only be
/// called once per process; a second call returns
/// [`TelemetryError::Init`].
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let registry = tracing_subscriber::registry().with(filter);

    let result = match (&config.format, &config.target) {
        (LogFormat::Json, LogTarget::Stdout) => registry.with(stdout_layer.json()).try_init(),
        (LogFormat::Pretty, LogTarget::Stdout) => registry.with(stdout_layer.pretty()).try_init(),
        (LogFormat::Compact, LogTarget::Stdout) => registry.with(stdout_layer.compact()).try_init(),
        (format, LogTarget::StdoutAndFile(dir)) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "agent.log");
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false);
            match format {
                LogFormat::Json => registry
                    .with(stdout_layer.json())
                    .with(file_layer.json())
                    .try_init(),
                LogFormat::Pretty => registry
                    .with(stdout_layer.pretty())
                    .with(file_layer.pretty())
                    .try_init(),
                LogFormat::Compact => registry
                    .with(stdout_layer.compact())
                    .with(file_layer.compact())
                    .try_init(),
            }
        },
    };

    result.map_err(|e| TelemetryError::Init(e.to_string()))
}

/// Convenience entry point: `info`-level, compact, stdout only.
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))
}
