use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use stavily_core::{DirectoryLayout, InstallationResult, Instruction, PluginInstallation, RECOGNIZED_MANIFESTS};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{PluginError, PluginResult};
use crate::fetch::{self, DownloadPlan, RefSpec};
use crate::source::GitSource;

/// Plugin Store (§4.3): install/update/uninstall/isInstalled/path, with a
/// per-`pluginId` lock serializing mutating operations, grounded on the
/// teacher's pervasive use of `dashmap` for exactly this shape of
/// keyed-lock registry.
pub struct PluginStore {
    layout: DirectoryLayout,
    git_timeout: Duration,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl PluginStore {
    #[must_use]
    pub fn new(layout: DirectoryLayout) -> Self {
        Self::with_git_timeout(layout, fetch::DEFAULT_GIT_TIMEOUT)
    }

    #[must_use]
    pub fn with_git_timeout(layout: DirectoryLayout, git_timeout: Duration) -> Self {
        Self {
            layout,
            git_timeout,
            locks: DashMap::new(),
        }
    }

    /// `isInstalled` (§4.3): lock-free, a direct filesystem check.
    #[must_use]
    pub fn is_installed(&self, plugin_id: &str) -> bool {
        self.layout.plugin_dir(plugin_id).is_dir()
    }

    /// `path` (§4.3).
    #[must_use]
    pub fn path(&self, plugin_id: &str) -> PathBuf {
        self.layout.plugin_dir(plugin_id)
    }

    /// `install` (§4.3): idempotent. Returns the existing installation
    /// without refetching if the directory already exists.
    pub async fn install(&self, instruction: &Instruction) -> PluginResult<InstallationResult> {
        let _guard = self.lock_for(&instruction.plugin_id).await;
        let dest = self.layout.plugin_dir(&instruction.plugin_id);

        if dest.is_dir() {
            tracing::info!(plugin_id = %instruction.plugin_id, "plugin already installed, skipping fetch");
            return Ok(self.success_result(instruction, &dest, None, vec!["plugin already installed".to_string()]));
        }

        self.fetch_fresh(instruction, &dest).await
    }

    /// `update` (§4.3): non-idempotent. Removes any existing installation
    /// first; behaves like `install` when nothing was there to begin with.
    pub async fn update(&self, instruction: &Instruction) -> PluginResult<InstallationResult> {
        let _guard = self.lock_for(&instruction.plugin_id).await;
        let dest = self.layout.plugin_dir(&instruction.plugin_id);

        let mut logs = Vec::new();
        if dest.is_dir() {
            tokio::fs::remove_dir_all(&dest).await?;
            logs.push("removed existing installation for update".to_string());
        } else {
            logs.push("no existing installation; update behaves as install".to_string());
        }

        self.fetch_fresh_with_logs(instruction, &dest, logs).await
    }

    /// `uninstall` (§4.3): idempotent.
    pub async fn uninstall(&self, plugin_id: &str) -> PluginResult<()> {
        let _guard = self.lock_for(plugin_id).await;
        let dest = self.layout.plugin_dir(plugin_id);
        if dest.is_dir() {
            tokio::fs::remove_dir_all(&dest).await?;
        }
        Ok(())
    }

    async fn fetch_fresh(&self, instruction: &Instruction, dest: &PathBuf) -> PluginResult<InstallationResult> {
        self.fetch_fresh_with_logs(instruction, dest, Vec::new()).await
    }

    async fn fetch_fresh_with_logs(
        &self,
        instruction: &Instruction,
        dest: &PathBuf,
        mut logs: Vec<String>,
    ) -> PluginResult<InstallationResult> {
        let url = instruction.repository_url().ok_or(PluginError::MissingRepositoryUrl)?;
        let source = GitSource::parse(url)?;
        let plan: DownloadPlan = fetch::resolve_download_plan(instruction)?;

        logs.push(format!("cloning {} ({})", source.clone_url(), describe_ref(&plan.ref_spec)));

        let start = Instant::now();
        fetch::clone_into(&source, &plan, self.git_timeout, dest).await?;

        if let Err(err) = structure_check(dest, &mut logs) {
            let _ = tokio::fs::remove_dir_all(dest).await;
            return Err(err);
        }

        let elapsed = start.elapsed().as_secs_f64();
        Ok(InstallationResult {
            plugin_id: instruction.plugin_id.clone(),
            success: true,
            installed_path: Some(dest.display().to_string()),
            version: plan.installed_version,
            logs,
            duration_seconds: elapsed,
            timestamp: chrono::Utc::now(),
            error: None,
        })
    }

    fn success_result(
        &self,
        instruction: &Instruction,
        dest: &PathBuf,
        version: Option<String>,
        logs: Vec<String>,
    ) -> InstallationResult {
        InstallationResult {
            plugin_id: instruction.plugin_id.clone(),
            success: true,
            installed_path: Some(dest.display().to_string()),
            version,
            logs,
            duration_seconds: 0.0,
            timestamp: chrono::Utc::now(),
            error: None,
        }
    }

    async fn lock_for(&self, plugin_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(plugin_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

/// After clone, the directory must be non-empty (hard failure). A recognized
/// manifest file is sought but its absence is only a log warning (§4.3).
fn structure_check(dest: &std::path::Path, logs: &mut Vec<String>) -> PluginResult<()> {
    let mut entries = std::fs::read_dir(dest)?;
    if entries.next().is_none() {
        return Err(PluginError::EmptyClone(dest.to_path_buf()));
    }

    let found = RECOGNIZED_MANIFESTS
        .iter()
        .find(|name| dest.join(name).exists());
    match found {
        Some(name) => logs.push(format!("found manifest file: {name}")),
        None => {
            tracing::warn!(dir = %dest.display(), "no recognized manifest file found after clone");
            logs.push("no recognized manifest file found (non-fatal)".to_string());
        },
    }
    Ok(())
}

fn describe_ref(ref_spec: &RefSpec) -> String {
    match ref_spec {
        RefSpec::Tag(t) => format!("tag {t}"),
        RefSpec::Branch(b) => format!("branch {b}"),
        RefSpec::Commit(c) => format!("commit {c}"),
        RefSpec::Default => "default branch".to_string(),
    }
}

/// Load a [`PluginInstallation`] for an already-installed plugin, locating
/// its manifest file if one is present.
#[must_use]
pub fn describe_installation(layout: &DirectoryLayout, plugin_id: &str) -> Option<PluginInstallation> {
    let path = layout.plugin_dir(plugin_id);
    if !path.is_dir() {
        return None;
    }
    let manifest_path = RECOGNIZED_MANIFESTS
        .iter()
        .map(|name| path.join(name))
        .find(|p| p.exists());
    Some(PluginInstallation {
        plugin_id: plugin_id.to_string(),
        path,
        manifest_path,
    })
}
