use std::path::{Path, PathBuf};

/// The deterministic directory tree derived from `baseDir` (§6). Created
/// once by Config & Layout on startup and treated as read-mostly
/// thereafter; destroyed only by an external operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    base_dir: PathBuf,
}

impl DirectoryLayout {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    #[must_use]
    pub fn config_plugins_dir(&self) -> PathBuf {
        self.config_dir().join("plugins")
    }

    #[must_use]
    pub fn certificates_dir(&self) -> PathBuf {
        self.config_dir().join("certificates")
    }

    #[must_use]
    pub fn agent_config_path(&self) -> PathBuf {
        self.config_dir().join("agent.toml")
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    #[must_use]
    pub fn data_plugins_dir(&self) -> PathBuf {
        self.data_dir().join("plugins")
    }

    #[must_use]
    pub fn plugin_dir(&self, plugin_id: &str) -> PathBuf {
        self.data_plugins_dir().join(plugin_id)
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("cache")
    }

    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir().join("state")
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    #[must_use]
    pub fn agent_log_path(&self) -> PathBuf {
        self.logs_dir().join("agent.log")
    }

    #[must_use]
    pub fn logs_plugins_dir(&self) -> PathBuf {
        self.logs_dir().join("plugins")
    }

    #[must_use]
    pub fn logs_audit_dir(&self) -> PathBuf {
        self.logs_dir().join("audit")
    }

    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.base_dir.join("tmp")
    }

    #[must_use]
    pub fn tmp_workdir(&self) -> PathBuf {
        self.tmp_dir().join("workdir")
    }

    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.certificates_dir().join("agent.jwt")
    }

    /// Every directory this layout is responsible for, paired with the
    /// Unix mode it must end up with. Private dirs (tokens, per-plugin
    /// config) get `0700`; shared data/log dirs get `0750`/`0755` per §6.
    #[must_use]
    pub fn directories_with_modes(&self) -> Vec<(PathBuf, u32)> {
        vec![
            (self.config_dir(), 0o750),
            (self.config_plugins_dir(), 0o700),
            (self.certificates_dir(), 0o700),
            (self.data_dir(), 0o750),
            (self.data_plugins_dir(), 0o755),
            (self.cache_dir(), 0o755),
            (self.state_dir(), 0o755),
            (self.logs_dir(), 0o750),
            (self.logs_plugins_dir(), 0o750),
            (self.logs_audit_dir(), 0o700),
            (self.tmp_dir(), 0o755),
            (self.tmp_workdir(), 0o755),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_derived_from_base_dir() {
        let layout = DirectoryLayout::new("/srv/stavily");
        assert_eq!(
            layout.plugin_dir("cpu-monitor"),
            PathBuf::from("/srv/stavily/data/plugins/cpu-monitor")
        );
        assert_eq!(
            layout.agent_config_path(),
            PathBuf::from("/srv/stavily/config/agent.toml")
        );
        assert_eq!(
            layout.tmp_workdir(),
            PathBuf::from("/srv/stavily/tmp/workdir")
        );
    }

    #[test]
    fn every_directory_is_under_base_dir() {
        let layout = DirectoryLayout::new("/srv/stavily");
        for (dir, _mode) in layout.directories_with_modes() {
            assert!(dir.starts_with(layout.base_dir()));
        }
    }
}
