use std::path::PathBuf;
use std::time::SystemTime;

use tokio::sync::Mutex;

use crate::error::{ClientError, ClientResult};

/// Bearer token source. Read once at startup and reloaded whenever the
/// token file's mtime advances (§4.2). When `STAVILY_AGENT_TOKEN` was set
/// at config-resolution time, it supplants the file entirely and reload is
/// a no-op.
pub struct TokenSource {
    path: PathBuf,
    fixed: Option<String>,
    cached: Mutex<CachedToken>,
}

#[derive(Default)]
struct CachedToken {
    value: String,
    loaded_mtime: Option<SystemTime>,
}

impl TokenSource {
    #[must_use]
    pub fn new(path: PathBuf, fixed_override: Option<String>) -> Self {
        Self {
            path,
            fixed: fixed_override,
            cached: Mutex::new(CachedToken::default()),
        }
    }

    /// Current bearer token, loading from disk on first use and whenever
    /// the file's mtime has advanced since the last load.
    pub async fn current(&self) -> ClientResult<String> {
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }

        let mut cached = self.cached.lock().await;
        let mtime = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok();

        if cached.loaded_mtime != mtime || cached.value.is_empty() {
            let contents = std::fs::read_to_string(&self.path).map_err(|source| ClientError::TokenIo {
                path: self.path.clone(),
                source,
            })?;
            cached.value = contents.trim().to_string();
            cached.loaded_mtime = mtime;
            tracing::debug!(path = %self.path.display(), "reloaded orchestrator bearer token");
        }

        Ok(cached.value.clone())
    }

    /// Force a reload on the next call to [`TokenSource::current`],
    /// regardless of mtime — used after a 401 to pick up a rotated token
    /// even if the filesystem clock didn't tick.
    pub async fn invalidate(&self) {
        if self.fixed.is_some() {
            return;
        }
        let mut cached = self.cached.lock().await;
        cached.loaded_mtime = None;
    }

    /// The token file's current mtime, without touching the cache. Used by
    /// the Workflow Loop to decide whether a degraded-auth recovery probe
    /// is worth attempting (§4.2, §7): no point retrying `poll` until the
    /// file actually changed. Always `None` when a fixed override is in
    /// effect, since there is nothing on disk to watch.
    #[must_use]
    pub fn file_mtime(&self) -> Option<SystemTime> {
        if self.fixed.is_some() {
            return None;
        }
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn fixed_override_wins_over_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp.as_file(), "file-token").unwrap();
        let source = TokenSource::new(tmp.path().to_path_buf(), Some("env-token".to_string()));
        assert_eq!(source.current().await.unwrap(), "env-token");
    }

    #[tokio::test]
    async fn reads_and_trims_file_contents() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp.as_file(), "file-token\n").unwrap();
        let source = TokenSource::new(tmp.path().to_path_buf(), None);
        assert_eq!(source.current().await.unwrap(), "file-token");
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp.as_file(), "first").unwrap();
        let source = TokenSource::new(tmp.path().to_path_buf(), None);
        assert_eq!(source.current().await.unwrap(), "first");

        // Overwrite without necessarily advancing mtime granularity;
        // invalidate() must force a reload regardless.
        std::fs::write(tmp.path(), "second\n").unwrap();
        source.invalidate().await;
        assert_eq!(source.current().await.unwrap(), "second");
    }
}
