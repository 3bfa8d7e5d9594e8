//! Platform-specific sandbox profiles for plugin subprocesses, grounded on
//! the teacher's `SandboxProfile`/`ResourceLimits`/`wrap_command` shape:
//! Linux gets Landlock filesystem confinement plus `setrlimit` ceilings
//! applied inside a `pre_exec` hook (see [`crate::linux`]); macOS gets a
//! `sandbox-exec` Scheme profile; everything else runs unconfined with a
//! warning, which the caller is expected to surface.

use std::path::PathBuf;

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
use tracing::warn;

use stavily_core::AgentPolicy;

#[cfg(target_os = "macos")]
use crate::error::SandboxError;
use crate::error::SandboxResult;

/// Resource ceilings translated from [`AgentPolicy`] into OS primitives.
/// `nice` is the best-effort stand-in for `max_cpu_share`: true CPU quotas
/// need cgroups, which an unprivileged agent process cannot reliably set
/// up, so share is instead expressed as a scheduling priority hint.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub max_processes: u64,
    pub max_memory_bytes: u64,
    pub max_open_files: u64,
    pub max_file_size: u64,
    pub nice: i32,
}

impl ResourceLimits {
    #[must_use]
    pub fn from_policy(policy: &AgentPolicy) -> Self {
        let share = policy.max_cpu_share.clamp(0.0, 1.0);
        #[allow(clippy::cast_possible_truncation)]
        let nice = ((1.0 - share) * 19.0).round() as i32;
        Self {
            max_processes: 256,
            max_memory_bytes: policy.max_memory_bytes,
            max_open_files: 256,
            max_file_size: policy.max_file_size,
            nice,
        }
    }
}

/// Sandbox profile for one plugin subprocess invocation.
#[derive(Debug, Clone)]
pub struct SandboxProfile {
    pub plugin_dir: PathBuf,
    pub extra_read_paths: Vec<PathBuf>,
    pub network_allowed: bool,
    pub resource_limits: ResourceLimits,
}

impl SandboxProfile {
    #[must_use]
    pub fn from_policy(policy: &AgentPolicy, plugin_dir: PathBuf) -> Self {
        Self {
            plugin_dir,
            extra_read_paths: policy.fs_allowlist.clone(),
            network_allowed: policy.network_allowed,
            resource_limits: ResourceLimits::from_policy(policy),
        }
    }

    /// Wrap a command with whatever platform-specific enforcement is
    /// available. On Linux this is a no-op: Landlock and `setrlimit` are
    /// applied later via a `pre_exec` hook on the `tokio::process::Command`
    /// itself (see [`crate::command::build_command`]), not by rewriting the
    /// program/args.
    pub fn wrap_command(&self, command: &str, args: &[String]) -> SandboxResult<(String, Vec<String>)> {
        self.platform_wrap_command(command, args)
    }

    #[cfg(target_os = "macos")]
    fn platform_wrap_command(&self, command: &str, args: &[String]) -> SandboxResult<(String, Vec<String>)> {
        let profile_content = self.generate_macos_profile(command);
        let profile_path = std::env::temp_dir().join(format!("stavily-sandbox-{}.sb", std::process::id()));
        std::fs::write(&profile_path, &profile_content)
            .map_err(|e| SandboxError::Profile(format!("failed to write sandbox profile: {e}")))?;

        let mut sandbox_args = vec![
            "-f".to_string(),
            profile_path.to_string_lossy().to_string(),
            command.to_string(),
        ];
        sandbox_args.extend(args.iter().cloned());
        Ok(("sandbox-exec".to_string(), sandbox_args))
    }

    #[cfg(target_os = "linux")]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn platform_wrap_command(&self, command: &str, args: &[String]) -> SandboxResult<(String, Vec<String>)> {
        Ok((command.to_string(), args.to_vec()))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    #[allow(clippy::unnecessary_wraps)]
    fn platform_wrap_command(&self, command: &str, args: &[String]) -> SandboxResult<(String, Vec<String>)> {
        warn!("OS-level sandboxing is not available on this platform; plugin will run unconfined");
        Ok((command.to_string(), args.to_vec()))
    }

    #[cfg(target_os = "macos")]
    fn generate_macos_profile(&self, command: &str) -> String {
        use std::fmt::Write;

        let mut profile = String::new();
        profile.push_str("(version 1)\n");
        profile.push_str("(deny default)\n\n");

        let _ = writeln!(profile, "(allow file-read* (subpath \"{}\"))", self.plugin_dir.display());
        let _ = writeln!(profile, "(allow file-write* (subpath \"{}\"))", self.plugin_dir.display());

        for sys_path in &["/usr/lib", "/usr/local/lib", "/usr/local/bin", "/usr/bin", "/private/var/folders"] {
            let _ = writeln!(profile, "(allow file-read* (subpath \"{sys_path}\"))");
        }

        for path in &self.extra_read_paths {
            let _ = writeln!(profile, "(allow file-read* (subpath \"{}\"))", path.display());
        }

        let _ = writeln!(profile, "(allow process-exec (literal \"{command}\"))");
        if let Ok(resolved) = which::which(command) {
            let _ = writeln!(profile, "(allow process-exec (literal \"{}\"))", resolved.display());
        }
        profile.push_str("(allow process-fork)\n");
        profile.push_str("(allow sysctl-read)\n");
        profile.push_str("(allow mach-lookup)\n");

        if self.network_allowed {
            profile.push_str("(allow network-outbound)\n");
            profile.push_str("(allow network-inbound)\n");
        } else {
            profile.push_str("(allow network-outbound (local ip \"localhost:*\"))\n");
        }

        profile
    }

    /// Landlock rule specifications for Linux: the plugin directory is
    /// read-write (it doubles as the working directory where `input.json`
    /// and any plugin output land), extra allowlisted paths are read-only.
    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn landlock_rules(&self) -> Vec<LandlockPathRule> {
        let mut rules = vec![LandlockPathRule {
            path: self.plugin_dir.clone(),
            read: true,
            write: true,
        }];

        for sys_path in ["/usr/lib", "/usr/local/lib", "/usr/bin", "/usr/local/bin", "/lib", "/lib64"] {
            let sys_path = std::path::Path::new(sys_path);
            if sys_path.exists() {
                rules.push(LandlockPathRule {
                    path: sys_path.to_path_buf(),
                    read: true,
                    write: false,
                });
            }
        }

        for path in &self.extra_read_paths {
            rules.push(LandlockPathRule {
                path: path.clone(),
                read: true,
                write: false,
            });
        }

        rules
    }
}

/// A single Landlock `PathBeneath` rule, opened eagerly before `fork()` and
/// enforced inside `pre_exec` (see [`crate::linux`]).
#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
pub struct LandlockPathRule {
    pub path: PathBuf,
    pub read: bool,
    pub write: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stavily_core::AgentRole;

    #[test]
    fn profile_carries_fs_allowlist_from_policy() {
        let mut policy = AgentPolicy::defaults_for(AgentRole::Sensor);
        policy.fs_allowlist = vec![PathBuf::from("/etc/ssl")];
        let profile = SandboxProfile::from_policy(&policy, PathBuf::from("/data/plugins/p1"));
        assert_eq!(profile.extra_read_paths, vec![PathBuf::from("/etc/ssl")]);
        assert!(!profile.network_allowed);
    }

    #[test]
    fn resource_limits_nice_tracks_cpu_share() {
        let policy = AgentPolicy::defaults_for(AgentRole::Action);
        let limits = ResourceLimits::from_policy(&policy);
        assert_eq!(limits.nice, 0);

        let mut sensor = AgentPolicy::defaults_for(AgentRole::Sensor);
        sensor.max_cpu_share = 0.5;
        let sensor_limits = ResourceLimits::from_policy(&sensor);
        assert_eq!(sensor_limits.nice, 10);
    }
}
