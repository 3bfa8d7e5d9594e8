use std::fs;
use std::os::unix::fs::PermissionsExt;

use stavily_core::DirectoryLayout;

use crate::error::ConfigError;

/// Create the full directory tree under `layout.base_dir()`, idempotently.
/// Directories that already exist with compatible modes are left alone;
/// file-mode tightening is applied. Any unwritable target or conflicting
/// existing file (not a directory) aborts with a [`ConfigError`].
///
/// Runs once per process start, before any other component touches the
/// filesystem.
pub fn materialize(layout: &DirectoryLayout) -> Result<(), ConfigError> {
    for (dir, mode) in layout.directories_with_modes() {
        create_and_tighten(&dir, mode)?;
    }
    tracing::info!(base_dir = %layout.base_dir().display(), "directory layout materialized");
    Ok(())
}

fn create_and_tighten(dir: &std::path::Path, mode: u32) -> Result<(), ConfigError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ConfigError::InvalidPath { path: dir.to_path_buf() });
        }
    } else {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %dir.display(), mode = format!("{mode:o}"), "created directory");
    }

    let metadata = fs::metadata(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let current_mode = metadata.permissions().mode() & 0o777;
    // Tighten only: never loosen an existing directory's permissions.
    let target_mode = current_mode & mode;
    if target_mode != current_mode {
        let mut perms = metadata.permissions();
        perms.set_mode(target_mode);
        fs::set_permissions(dir, perms).map_err(|source| {
            let _ = &source;
            ConfigError::PermissionDenied {
                path: dir.to_path_buf(),
                reason: "failed to tighten directory mode".to_string(),
            }
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_creates_full_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(tmp.path());
        materialize(&layout).unwrap();
        assert!(layout.data_plugins_dir().is_dir());
        assert!(layout.tmp_workdir().is_dir());
        assert!(layout.logs_audit_dir().is_dir());
    }

    #[test]
    fn materialize_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(tmp.path());
        materialize(&layout).unwrap();
        materialize(&layout).unwrap();
        assert!(layout.data_plugins_dir().is_dir());
    }

    #[test]
    fn materialize_tightens_loose_existing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(tmp.path());
        fs::create_dir_all(layout.logs_audit_dir()).unwrap();
        fs::set_permissions(layout.logs_audit_dir(), fs::Permissions::from_mode(0o777)).unwrap();
        materialize(&layout).unwrap();
        let mode = fs::metadata(layout.logs_audit_dir()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn materialize_rejects_a_file_where_a_dir_is_expected() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(tmp.path());
        fs::create_dir_all(layout.base_dir()).unwrap();
        fs::write(layout.data_dir(), b"not a directory").unwrap();
        let err = materialize(&layout).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
    }
}
