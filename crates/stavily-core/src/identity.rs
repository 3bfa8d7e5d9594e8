use serde::{Deserialize, Serialize};

/// The two agent roles. Both share the engine; they differ only in the
/// policy defaults derived in [`crate::AgentPolicy::defaults_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Observes the host; plugins never get network access.
    Sensor,
    /// Mutates the host; plugins may reach the network.
    Action,
}

impl AgentRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Action => "action",
        }
    }
}

/// Immutable identity of one running agent instance. Derived once at
/// startup from configuration and embedded in every outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: String,
    pub role: AgentRole,
    pub organization_id: String,
    pub version: String,
    pub hostname: String,
    pub platform: String,
    pub arch: String,
}

impl AgentIdentity {
    /// Build an identity from configuration values plus the host facts
    /// (`hostname`, `platform`, `arch`) that are not themselves configured.
    #[must_use]
    pub fn new(id: String, role: AgentRole, organization_id: String, version: String) -> Self {
        Self {
            id,
            role,
            organization_id,
            version,
            hostname: hostname_or_unknown(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

fn hostname_or_unknown() -> String {
    // `gethostname` isn't in std; fall back to an env var rather than
    // pulling in a dependency solely for this one fact.
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}
