//! `stavilyd` — standalone daemon binary for the Stavily agent runtime.
//!
//! Thin entry point: resolve configuration, materialize the on-disk
//! layout, register with the orchestrator, then hand off to the Workflow
//! Loop until a stop signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use stavily_agent::{HealthAggregator, WorkflowLoop, register};
use stavily_config::{ConfigOverrides, EnvOverrides, materialize, resolve};
use stavily_core::AgentMetrics;
use stavily_dispatcher::DispatchContext;
use stavily_orchestrator_client::{ClientConfig, OrchestratorClient, RetryPolicy};
use stavily_plugin_store::PluginStore;
use stavily_telemetry::{LogConfig, LogFormat, setup_logging};
use tokio_util::sync::CancellationToken;

/// Stavily Agent — host-resident polling agent for plugin orchestration.
#[derive(Parser)]
#[command(name = "stavilyd")]
#[command(author, version, about = "Stavily agent daemon")]
struct Args {
    /// Path to the agent's TOML configuration file.
    #[arg(long, default_value = "/etc/stavily/agent.toml")]
    config: PathBuf,

    /// Override the configured base directory.
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Poll and dispatch at most one instruction, then exit, instead of
    /// looping forever.
    #[arg(long)]
    once: bool,

    /// Grace period for the stop sequence, in seconds.
    #[arg(long, default_value_t = 10)]
    stop_grace_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvOverrides::from_env();
    let cli = ConfigOverrides {
        base_dir: args.base_dir.clone(),
    };
    let resolved = resolve(&args.config, &env, &cli).context("failed to resolve agent configuration")?;

    let level = if args.verbose { "debug" } else { "info" };
    let log_config = LogConfig::new(level).with_format(LogFormat::Compact).with_file(resolved.layout.logs_dir());
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {e}");
    }

    materialize(&resolved.layout).context("failed to materialize on-disk layout")?;

    let client_config = ClientConfig {
        base_url: resolved.orchestrator.base_url.clone(),
        agent_id: resolved.identity.id.clone(),
        token_path: resolved.orchestrator.token_path.clone(),
        token_override: resolved.orchestrator.token_override.clone(),
        retry: RetryPolicy::new(resolved.orchestrator.retry.max_attempts, resolved.orchestrator.retry.max_interval),
        rate_limit_burst: resolved.orchestrator.rate_limit.burst,
        rate_limit_per_second: resolved.orchestrator.rate_limit.requests_per_second,
    };
    let client = Arc::new(OrchestratorClient::new(client_config).context("failed to build orchestrator client")?);

    register(&client, &resolved.identity, resolved.demo_mode)
        .await
        .context("failed to register with orchestrator")?;

    let plugin_store = Arc::new(PluginStore::new(resolved.layout.clone()));
    let dispatch_ctx = Arc::new(DispatchContext::new(plugin_store, Arc::clone(&client), resolved.policy.clone()));

    let workflow = WorkflowLoop::new(
        client,
        dispatch_ctx,
        HealthAggregator::new(),
        Arc::new(AgentMetrics::new()),
        resolved.heartbeat_interval,
        resolved.poll_interval,
    );

    let cancellation = CancellationToken::new();
    let stop_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, stopping");
            stop_signal.cancel();
        }
    });

    workflow.run(cancellation, Duration::from_secs(args.stop_grace_seconds), args.once).await;

    tracing::info!("stavilyd stopped");
    Ok(())
}
