use crate::error::{PluginError, PluginResult};

/// Validate that a URL uses an allowed scheme.
pub fn validate_url_scheme(url: &str) -> PluginResult<()> {
    let allowed = ["https://", "ssh://"];
    if allowed.iter().any(|scheme| url.starts_with(scheme)) {
        return Ok(());
    }
    Err(PluginError::InvalidSource(format!(
        "blocked URL scheme in '{url}'. Only https:// and ssh:// are allowed"
    )))
}

/// Validate an SSH hostname for safety.
pub fn validate_ssh_host(host: &str) -> PluginResult<()> {
    let is_valid = host
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.'));
    if !is_valid {
        return Err(PluginError::InvalidSource(format!(
            "SSH host contains invalid characters: '{host}'"
        )));
    }
    if host.starts_with('-') || host.starts_with('.') || host.ends_with('.') {
        return Err(PluginError::InvalidSource(format!("SSH host has invalid format: '{host}'")));
    }
    Ok(())
}

/// Validate an SSH path component for safety.
pub fn validate_ssh_path(path: &str) -> PluginResult<()> {
    if path.contains("..") {
        return Err(PluginError::InvalidSource(format!("SSH path contains '..': '{path}'")));
    }
    let has_bad_chars = path
        .bytes()
        .any(|b| b.is_ascii_control() || matches!(b, b' ' | b'\\' | b':'));
    if has_bad_chars {
        return Err(PluginError::InvalidSource(format!(
            "SSH path contains invalid characters: '{path}'"
        )));
    }
    Ok(())
}

/// Validate a GitHub org or repo component against injection attacks.
pub fn validate_github_component(value: &str, label: &str) -> PluginResult<()> {
    if value.is_empty() || value.len() > 100 {
        return Err(PluginError::InvalidSource(format!(
            "GitHub {label} must be 1-100 characters, got {}",
            value.len()
        )));
    }
    let is_valid = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if !is_valid {
        return Err(PluginError::InvalidSource(format!(
            "GitHub {label} contains invalid characters: '{value}'"
        )));
    }
    if value.starts_with('.') || value.starts_with('-') || value.ends_with('.') || value.contains("..") {
        return Err(PluginError::InvalidSource(format!("GitHub {label} has invalid format: '{value}'")));
    }
    Ok(())
}

/// Validate a git ref (branch, tag, or commit) for safety.
pub fn validate_git_ref(git_ref: &str) -> PluginResult<()> {
    if git_ref.is_empty() || git_ref.len() > 256 {
        return Err(PluginError::InvalidSource("git ref must be 1-256 characters".into()));
    }
    if git_ref.contains("..") {
        return Err(PluginError::InvalidSource(format!("git ref contains '..': '{git_ref}'")));
    }
    if git_ref.starts_with('-') {
        return Err(PluginError::InvalidSource(format!(
            "git ref must not start with '-': '{git_ref}'"
        )));
    }
    let is_valid = git_ref
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'/'));
    if !is_valid {
        return Err(PluginError::InvalidSource(format!(
            "git ref contains invalid characters: '{git_ref}'"
        )));
    }
    if git_ref.starts_with('.')
        || git_ref.ends_with('.')
        || git_ref.starts_with('/')
        || git_ref.ends_with('/')
        || std::path::Path::new(git_ref)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("lock"))
        || git_ref.contains("//")
    {
        return Err(PluginError::InvalidSource(format!("git ref has invalid format: '{git_ref}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_allowlist() {
        assert!(validate_url_scheme("https://github.com/org/repo").is_ok());
        assert!(validate_url_scheme("file:///etc/passwd").is_err());
    }

    #[test]
    fn git_ref_rejects_traversal() {
        assert!(validate_git_ref("../../etc").is_err());
        assert!(validate_git_ref("main").is_ok());
    }
}
