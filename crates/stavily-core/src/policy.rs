use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::AgentRole;

/// Role-derived resource and access ceilings enforced by the Sandbox
/// Executor. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPolicy {
    pub max_memory_bytes: u64,
    pub max_cpu_share: f64,
    #[serde(with = "duration_seconds")]
    pub max_exec_time: Duration,
    pub max_file_size: u64,
    pub network_allowed: bool,
    pub fs_allowlist: Vec<PathBuf>,
    pub user: Option<String>,
    pub chroot: Option<PathBuf>,
}

impl AgentPolicy {
    /// Role-derived defaults named in §3 of the spec: Sensor is stricter
    /// (no network, ~256 MB, ~5 min); Action is looser (~512 MB, ~30 min,
    /// network on).
    #[must_use]
    pub fn defaults_for(role: AgentRole) -> Self {
        match role {
            AgentRole::Sensor => Self {
                max_memory_bytes: 256 * 1024 * 1024,
                max_cpu_share: 0.5,
                max_exec_time: Duration::from_secs(5 * 60),
                max_file_size: 50 * 1024 * 1024,
                network_allowed: false,
                fs_allowlist: Vec::new(),
                user: None,
                chroot: None,
            },
            AgentRole::Action => Self {
                max_memory_bytes: 512 * 1024 * 1024,
                max_cpu_share: 1.0,
                max_exec_time: Duration::from_secs(30 * 60),
                max_file_size: 200 * 1024 * 1024,
                network_allowed: true,
                fs_allowlist: Vec::new(),
                user: None,
                chroot: None,
            },
        }
    }
}

mod duration_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_defaults_deny_network() {
        let policy = AgentPolicy::defaults_for(AgentRole::Sensor);
        assert!(!policy.network_allowed);
        assert_eq!(policy.max_memory_bytes, 256 * 1024 * 1024);
        assert_eq!(policy.max_exec_time, Duration::from_secs(5 * 60));
    }

    #[test]
    fn action_defaults_allow_network() {
        let policy = AgentPolicy::defaults_for(AgentRole::Action);
        assert!(policy.network_allowed);
        assert_eq!(policy.max_memory_bytes, 512 * 1024 * 1024);
        assert_eq!(policy.max_exec_time, Duration::from_secs(30 * 60));
    }
}
