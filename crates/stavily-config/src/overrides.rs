/// Sensitive environment overrides consumed per §6. Only these five
/// variables are read from the process environment — everything else must
/// come from the config file or CLI flags.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub agent_token: Option<String>,
    pub demo_mode: Option<bool>,
    pub organization_id: Option<String>,
    pub environment: Option<String>,
    pub base_dir: Option<String>,
}

impl EnvOverrides {
    /// Read the five `STAVILY_*` variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            agent_token: std::env::var("STAVILY_AGENT_TOKEN").ok(),
            demo_mode: std::env::var("STAVILY_DEMO_MODE")
                .ok()
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            organization_id: std::env::var("STAVILY_ORG_ID").ok(),
            environment: std::env::var("STAVILY_ENV").ok(),
            base_dir: std::env::var("STAVILY_BASE_DIR").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_mode_parses_common_truthy_spellings() {
        for value in ["1", "true", "TRUE", "yes"] {
            unsafe {
                std::env::set_var("STAVILY_DEMO_MODE", value);
            }
            let overrides = EnvOverrides::from_env();
            assert_eq!(overrides.demo_mode, Some(true), "value={value}");
        }
        unsafe {
            std::env::remove_var("STAVILY_DEMO_MODE");
        }
    }
}
