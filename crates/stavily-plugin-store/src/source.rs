use crate::error::{PluginError, PluginResult};
use crate::validate::{
    validate_git_ref, validate_github_component, validate_ssh_host, validate_ssh_path, validate_url_scheme,
};

/// A parsed repository reference. Accepts the teacher's `github:`/`git:`/SSH
/// shorthand grammar unchanged, plus bare `https://`/`git@host:` URLs — the
/// repository URL precedence in §4.3 resolves to a plain URL string most of
/// the time, not the shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitSource {
    GitHub {
        org: String,
        repo: String,
        git_ref: Option<String>,
    },
    GitUrl {
        url: String,
        git_ref: Option<String>,
    },
}

impl GitSource {
    /// # Errors
    ///
    /// Returns an error for invalid format or blocked URL schemes.
    pub fn parse(source: &str) -> PluginResult<Self> {
        if let Some(rest) = source.strip_prefix("github:") {
            return Self::parse_github(rest);
        }
        if let Some(rest) = source.strip_prefix("git:") {
            return Self::parse_git_url(rest);
        }
        if Self::looks_like_bare_https(source) {
            return Self::parse_git_url(source);
        }
        if source.starts_with("git@") {
            return Self::parse_ssh_url(source);
        }
        Err(PluginError::InvalidSource(format!(
            "invalid git source: '{source}'. Expected 'github:org/repo[@ref]', 'git:URL[@ref]', or a git URL (https/ssh)"
        )))
    }

    /// The URL `git clone` should be invoked with.
    #[must_use]
    pub fn clone_url(&self) -> String {
        match self {
            Self::GitHub { org, repo, .. } => format!("https://github.com/{org}/{repo}.git"),
            Self::GitUrl { url, .. } => url.clone(),
        }
    }

    fn looks_like_bare_https(source: &str) -> bool {
        let Some(after_scheme) = source.strip_prefix("https://") else {
            return false;
        };
        let host = after_scheme.split('/').next().unwrap_or("");
        if host.eq_ignore_ascii_case("github.com") || host.eq_ignore_ascii_case("gitlab.com") {
            return true;
        }
        let (url_part, _) = split_ref(source);
        std::path::Path::new(url_part.as_str())
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("git"))
    }

    fn parse_github(rest: &str) -> PluginResult<Self> {
        let (path, git_ref) = split_ref(rest);
        let parts: Vec<&str> = path.splitn(2, '/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(PluginError::InvalidSource(format!(
                "invalid GitHub specifier: '{rest}'. Expected 'org/repo[@ref]'"
            )));
        }
        validate_github_component(parts[0], "org")?;
        validate_github_component(parts[1], "repo")?;
        if let Some(ref r) = git_ref {
            validate_git_ref(r)?;
        }
        Ok(Self::GitHub {
            org: parts[0].to_string(),
            repo: parts[1].to_string(),
            git_ref,
        })
    }

    fn parse_git_url(rest: &str) -> PluginResult<Self> {
        let (url, git_ref) = split_ref(rest);
        validate_url_scheme(&url)?;
        if let Some(ref r) = git_ref {
            validate_git_ref(r)?;
        }
        Ok(Self::GitUrl { url, git_ref })
    }

    fn parse_ssh_url(source: &str) -> PluginResult<Self> {
        let (url_part, git_ref) = split_ssh_ref(source);
        let after_at = url_part
            .strip_prefix("git@")
            .ok_or_else(|| PluginError::InvalidSource(format!("invalid SSH URL: '{source}'")))?;
        let (host, path) = after_at.split_once(':').ok_or_else(|| {
            PluginError::InvalidSource(format!("invalid SSH URL: '{source}'. Expected 'git@host:org/repo'"))
        })?;
        if host.is_empty() || path.is_empty() {
            return Err(PluginError::InvalidSource(format!(
                "invalid SSH URL: '{source}'. Expected 'git@host:org/repo'"
            )));
        }
        validate_ssh_host(host)?;
        validate_ssh_path(path)?;
        let url = format!("ssh://git@{host}/{path}");
        validate_url_scheme(&url)?;
        if let Some(ref r) = git_ref {
            validate_git_ref(r)?;
        }
        Ok(Self::GitUrl { url, git_ref })
    }
}

/// Split a `value@ref` string into `(value, Option<ref>)`, taking care not
/// to split on the `@` in `ssh://git@host` credentials.
fn split_ref(s: &str) -> (String, Option<String>) {
    if let Some(scheme_end) = s.find("://") {
        let authority_start = scheme_end.saturating_add(3);
        let after_scheme = &s[authority_start..];
        let path_start = after_scheme.find('/').unwrap_or(after_scheme.len());
        let path_portion = &after_scheme[path_start..];
        if let Some(at_pos) = path_portion.rfind('@') {
            let split_pos = authority_start.saturating_add(path_start).saturating_add(at_pos);
            let url = s[..split_pos].to_string();
            let ref_start = split_pos.saturating_add(1);
            let git_ref = s[ref_start..].to_string();
            if git_ref.is_empty() {
                return (s.to_string(), None);
            }
            return (url, Some(git_ref));
        }
        return (s.to_string(), None);
    }

    if let Some(at_pos) = s.find('@') {
        let value = s[..at_pos].to_string();
        let ref_start = at_pos.saturating_add(1);
        let git_ref = s[ref_start..].to_string();
        if git_ref.is_empty() {
            return (s.to_string(), None);
        }
        return (value, Some(git_ref));
    }

    (s.to_string(), None)
}

/// Split an SCP-style SSH ref: `git@host:org/repo.git@ref`.
fn split_ssh_ref(s: &str) -> (String, Option<String>) {
    if let Some((host_part, path)) = s.split_once(':')
        && let Some((path_part, git_ref)) = path.rsplit_once('@')
        && !git_ref.is_empty()
    {
        let url = format!("{host_part}:{path_part}");
        return (url, Some(git_ref.to_string()));
    }
    (s.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_github_shorthand() {
        let src = GitSource::parse("github:stavily/cpu-monitor@v1.2.0").unwrap();
        assert_eq!(
            src,
            GitSource::GitHub {
                org: "stavily".to_string(),
                repo: "cpu-monitor".to_string(),
                git_ref: Some("v1.2.0".to_string()),
            }
        );
    }

    #[test]
    fn parse_bare_https_url() {
        let src = GitSource::parse("https://git.example.com/plugins/cpu-monitor.git").unwrap();
        assert_eq!(
            src,
            GitSource::GitUrl {
                url: "https://git.example.com/plugins/cpu-monitor.git".to_string(),
                git_ref: None,
            }
        );
    }

    #[test]
    fn parse_ssh_shorthand() {
        let src = GitSource::parse("git@github.com:stavily/cpu-monitor.git@main").unwrap();
        assert_eq!(
            src,
            GitSource::GitUrl {
                url: "ssh://git@github.com/stavily/cpu-monitor.git".to_string(),
                git_ref: Some("main".to_string()),
            }
        );
    }

    #[test]
    fn rejects_blocked_scheme() {
        let err = GitSource::parse("git:file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("blocked URL scheme"));
    }

    #[test]
    fn clone_url_for_github_shorthand() {
        let src = GitSource::GitHub {
            org: "stavily".into(),
            repo: "cpu-monitor".into(),
            git_ref: None,
        };
        assert_eq!(src.clone_url(), "https://github.com/stavily/cpu-monitor.git");
    }
}
