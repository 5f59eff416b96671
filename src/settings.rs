use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub policy: PolicyOpts,
}

/// Where rules come from and which rule answers for undefined names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOpts {
    /// Policy document loaded first. Empty disables it.
    #[serde(default = "default_policy_file")]
    pub policy_file: String,
    /// Rule evaluated when a requested rule is not defined. Empty disables
    /// the fallback.
    #[serde(default = "default_policy_default_rule")]
    pub policy_default_rule: String,
    /// Directories walked after the policy file, in order. Later files win
    /// on name collisions.
    #[serde(default = "default_policy_dirs")]
    pub policy_dirs: Vec<PathBuf>,
}

fn default_policy_file() -> String {
    "policy.json".to_string()
}

fn default_policy_default_rule() -> String {
    "default".to_string()
}

fn default_policy_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("policy.d")]
}

impl Default for PolicyOpts {
    fn default() -> Self {
        Self {
            policy_file: default_policy_file(),
            policy_default_rule: default_policy_default_rule(),
            policy_dirs: default_policy_dirs(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with_env_prefix(path, "RULEGATE")
    }

    fn load_with_env_prefix(path: &str, env_prefix: &str) -> Result<Self> {
        let defaults = PolicyOpts::default();
        let mut builder = config::Config::builder()
            .set_default("policy.policy_file", defaults.policy_file)
            .into_diagnostic()?
            .set_default("policy.policy_default_rule", defaults.policy_default_rule)
            .into_diagnostic()?
            .set_default(
                "policy.policy_dirs",
                defaults
                    .policy_dirs
                    .iter()
                    .map(|d| d.to_string_lossy().to_string())
                    .collect::<Vec<_>>(),
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: RULEGATE__POLICY__POLICY_FILE=/etc/app/policy.json,
        // RULEGATE__POLICY__POLICY_DIRS=policy.d,/etc/app/policy.d
        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("policy.policy_dirs")
                .try_parsing(true),
        );

        let cfg = builder.build().into_diagnostic()?;
        let s: Settings = cfg.try_deserialize().into_diagnostic()?;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_settings_load_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nonexistent.toml");

        let settings = Settings::load(config_path.to_str().unwrap())
            .expect("Failed to load settings");

        assert_eq!(settings.policy.policy_file, "policy.json");
        assert_eq!(settings.policy.policy_default_rule, "default");
        assert_eq!(settings.policy.policy_dirs, vec![PathBuf::from("policy.d")]);
    }

    #[test]
    fn test_settings_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let config_content = r#"
[policy]
policy_file = "/etc/storage/policy.json"
policy_default_rule = "deny_all"
policy_dirs = ["/etc/storage/policy.d", "/srv/overrides"]
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let settings = Settings::load(config_path.to_str().unwrap())
            .expect("Failed to load settings");

        assert_eq!(settings.policy.policy_file, "/etc/storage/policy.json");
        assert_eq!(settings.policy.policy_default_rule, "deny_all");
        assert_eq!(
            settings.policy.policy_dirs,
            vec![
                PathBuf::from("/etc/storage/policy.d"),
                PathBuf::from("/srv/overrides")
            ]
        );
    }

    #[test]
    fn test_settings_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        fs::write(&config_path, "[policy]\npolicy_default_rule = \"\"\n")
            .expect("Failed to write config");

        let settings = Settings::load(config_path.to_str().unwrap())
            .expect("Failed to load settings");

        assert_eq!(settings.policy.policy_file, "policy.json");
        assert_eq!(settings.policy.policy_default_rule, "");
        assert_eq!(settings.policy.policy_dirs, vec![PathBuf::from("policy.d")]);
    }

    #[test]
    fn test_settings_env_override() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        fs::write(&config_path, "[policy]\npolicy_file = \"from_file.json\"\n")
            .expect("Failed to write config");

        // Separate prefix so parallel tests never see these variables
        env::set_var("RGTEST__POLICY__POLICY_FILE", "from_env.json");
        env::set_var("RGTEST__POLICY__POLICY_DIRS", "a.d,b.d");

        let settings = Settings::load_with_env_prefix(config_path.to_str().unwrap(), "RGTEST")
            .expect("Failed to load settings");

        assert_eq!(settings.policy.policy_file, "from_env.json");
        assert_eq!(
            settings.policy.policy_dirs,
            vec![PathBuf::from("a.d"), PathBuf::from("b.d")]
        );

        env::remove_var("RGTEST__POLICY__POLICY_FILE");
        env::remove_var("RGTEST__POLICY__POLICY_DIRS");
    }
}
