use std::path::{Path, PathBuf};
use std::time::Duration;

use stavily_core::{AgentIdentity, AgentPolicy, AgentRole, DirectoryLayout};

use crate::error::ConfigError;
use crate::file::AgentFileConfig;
use crate::overrides::EnvOverrides;

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// CLI-flag-sourced overrides. Built by the binary crate's `clap` parser;
/// `stavily-config` itself takes no `clap` dependency.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub max_interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub burst: u32,
    pub requests_per_second: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            burst: 10,
            requests_per_second: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub base_url: String,
    pub auth_mode: String,
    pub token_path: PathBuf,
    /// When set (from `STAVILY_AGENT_TOKEN`), supplants the token file's
    /// contents entirely (§6).
    pub token_override: Option<String>,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
}

/// Everything the rest of the engine needs to start: identity, policy,
/// layout, orchestrator settings, and the two tick cadences.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub identity: AgentIdentity,
    pub policy: AgentPolicy,
    pub layout: DirectoryLayout,
    pub orchestrator: OrchestratorSettings,
    pub demo_mode: bool,
    pub environment: String,
    pub heartbeat_interval: Duration,
    pub poll_interval: Duration,
    pub trigger_check_interval: Option<Duration>,
}

/// Resolve the full agent configuration from a config file path, sensitive
/// environment overrides, and CLI flag overrides, in that precedence order
/// (CLI wins, then env, then file) for the fields each layer can set.
///
/// # Errors
///
/// Returns [`ConfigError`] for any I/O failure, parse failure, missing
/// required field, or invalid value. All are fatal at startup per §4.1.
pub fn resolve(
    config_path: &Path,
    env: &EnvOverrides,
    cli: &ConfigOverrides,
) -> Result<ResolvedConfig, ConfigError> {
    let text = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
        path: config_path.to_path_buf(),
        source,
    })?;
    let file: AgentFileConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: config_path.to_path_buf(),
        message: e.to_string(),
    })?;

    validate_required(&file)?;

    let role = parse_role(&file.role)?;

    let organization_id = env
        .organization_id
        .clone()
        .unwrap_or_else(|| file.organization_id.clone());

    let base_dir = cli
        .base_dir
        .clone()
        .or_else(|| env.base_dir.clone().map(PathBuf::from))
        .or_else(|| file.base_dir.clone().map(PathBuf::from))
        .ok_or(ConfigError::MissingField { field: "base_dir" })?;

    let environment = env
        .environment
        .clone()
        .or_else(|| file.environment.clone())
        .unwrap_or_else(|| "production".to_string());

    let demo_mode = env.demo_mode.unwrap_or(false);

    let version = file
        .version
        .clone()
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    let identity = AgentIdentity::new(file.id.clone(), role, organization_id, version);

    let policy = build_policy(role, &file)?;

    let poll_interval = positive_or_default(file.agent.poll_interval_seconds, DEFAULT_POLL_INTERVAL);

    let trigger_check_interval = match role {
        AgentRole::Sensor => Some(positive_or_default(
            file.agent.trigger_check_interval_seconds,
            DEFAULT_POLL_INTERVAL,
        )),
        AgentRole::Action => None,
    };

    let heartbeat_interval =
        positive_or_default(file.agent.heartbeat_interval_seconds, DEFAULT_HEARTBEAT_INTERVAL);

    let token_path = file
        .api
        .token_path
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| DirectoryLayout::new(&base_dir).token_path());

    let orchestrator = OrchestratorSettings {
        base_url: file.api.base_url.clone(),
        auth_mode: file.api.auth_mode.clone(),
        token_path,
        token_override: env.agent_token.clone(),
        retry: RetrySettings {
            max_attempts: file
                .api
                .retry
                .max_attempts
                .filter(|&n| n > 0)
                .unwrap_or_else(|| RetrySettings::default().max_attempts),
            max_interval: file
                .api
                .retry
                .max_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or_else(|| RetrySettings::default().max_interval),
        },
        rate_limit: RateLimitSettings {
            burst: file.api.rate_limit.burst.unwrap_or_else(|| RateLimitSettings::default().burst),
            requests_per_second: file
                .api
                .rate_limit
                .requests_per_second
                .unwrap_or_else(|| RateLimitSettings::default().requests_per_second),
        },
    };

    let layout = DirectoryLayout::new(base_dir);

    Ok(ResolvedConfig {
        identity,
        policy,
        layout,
        orchestrator,
        demo_mode,
        environment,
        heartbeat_interval,
        poll_interval,
        trigger_check_interval,
    })
}

fn validate_required(file: &AgentFileConfig) -> Result<(), ConfigError> {
    if file.id.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "id" });
    }
    if file.role.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "role" });
    }
    if file.organization_id.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "organization_id" });
    }
    if file.api.base_url.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "api.base_url" });
    }
    if file.api.auth_mode.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "api.auth_mode" });
    }
    Ok(())
}

fn parse_role(raw: &str) -> Result<AgentRole, ConfigError> {
    match raw {
        "sensor" => Ok(AgentRole::Sensor),
        "action" => Ok(AgentRole::Action),
        other => Err(ConfigError::InvalidValue {
            field: "role",
            reason: format!("expected 'sensor' or 'action', got '{other}'"),
        }),
    }
}

fn build_policy(role: AgentRole, file: &AgentFileConfig) -> Result<AgentPolicy, ConfigError> {
    let mut policy = AgentPolicy::defaults_for(role);
    if let Some(bytes) = file.policy.max_memory_bytes {
        policy.max_memory_bytes = bytes;
    }
    if let Some(secs) = file.policy.max_exec_time_seconds {
        policy.max_exec_time = Duration::from_secs(secs);
    }
    if let Some(bytes) = file.policy.max_file_size {
        policy.max_file_size = bytes;
    }
    if let Some(allowed) = file.policy.network_allowed {
        policy.network_allowed = allowed;
    }
    if let Some(paths) = &file.policy.fs_allowlist {
        policy.fs_allowlist = paths.iter().map(PathBuf::from).collect();
    }
    Ok(policy)
}

/// Zero or missing defaults; negative is also treated as the default
/// (never a panic), per §8's boundary-behavior properties.
fn positive_or_default(raw: Option<i64>, default: Duration) -> Duration {
    match raw {
        Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("agent.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn resolves_minimal_action_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
            id = "agent-1"
            role = "action"
            organization_id = "org-1"
            base_dir = "/srv/stavily"

            [api]
            base_url = "https://orchestrator.example"
            auth_mode = "bearer"
            "#,
        );
        let resolved = resolve(&path, &EnvOverrides::default(), &ConfigOverrides::default()).unwrap();
        assert_eq!(resolved.identity.id, "agent-1");
        assert!(resolved.policy.network_allowed);
        assert_eq!(resolved.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(resolved.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
            id = "agent-1"
            role = "action"
            organization_id = "org-1"
            base_dir = "/srv/stavily"
            typo_field = true

            [api]
            base_url = "https://orchestrator.example"
            auth_mode = "bearer"
            "#,
        );
        let err = resolve(&path, &EnvOverrides::default(), &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn negative_poll_interval_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
            id = "agent-1"
            role = "action"
            organization_id = "org-1"
            base_dir = "/srv/stavily"

            [api]
            base_url = "https://orchestrator.example"
            auth_mode = "bearer"

            [agent]
            poll_interval_seconds = -5
            "#,
        );
        let resolved = resolve(&path, &EnvOverrides::default(), &ConfigOverrides::default()).unwrap();
        assert_eq!(resolved.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn cli_base_dir_overrides_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
            id = "agent-1"
            role = "sensor"
            organization_id = "org-1"
            base_dir = "/srv/stavily"

            [api]
            base_url = "https://orchestrator.example"
            auth_mode = "bearer"
            "#,
        );
        let cli = ConfigOverrides {
            base_dir: Some(PathBuf::from("/override")),
        };
        let resolved = resolve(&path, &EnvOverrides::default(), &cli).unwrap();
        assert_eq!(resolved.layout.base_dir(), Path::new("/override"));
    }
}
