use serde::Deserialize;

/// The on-disk `agent.toml` shape. `deny_unknown_fields` makes config drift
/// a hard parse error rather than a silently-ignored field, per §4.1.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentFileConfig {
    pub id: String,
    pub role: String,
    pub organization_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub base_dir: Option<String>,

    pub api: ApiSection,

    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSection {
    pub base_url: String,
    pub auth_mode: String,
    #[serde(default)]
    pub token_path: Option<String>,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub max_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct RateLimitSection {
    pub burst: Option<u32>,
    pub requests_per_second: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct AgentSection {
    pub poll_interval_seconds: Option<i64>,
    pub heartbeat_interval_seconds: Option<i64>,
    pub trigger_check_interval_seconds: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct PolicySection {
    pub max_memory_bytes: Option<u64>,
    pub max_exec_time_seconds: Option<u64>,
    pub max_file_size: Option<u64>,
    pub network_allowed: Option<bool>,
    pub fs_allowlist: Option<Vec<String>>,
}
