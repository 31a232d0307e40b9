//! Configuration management for the Supplyhub authorization core
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (SUPPLYHUB_* prefix, highest precedence)
//! 2. supplyhub.local.toml (gitignored, local overrides)
//! 3. supplyhub.toml (git-tracked, project config)
//! 4. ~/.config/supplyhub/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Nested keys in environment variables are separated by a double
//! underscore: `SUPPLYHUB_ENRICHMENT__FAILURE_MODE=fail-closed`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use supplyhub_abac::defaults::default_policy_config;
use supplyhub_abac::{EnrichmentFailureMode, PolicyConfiguration};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main authorization configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyhubConfig {
    pub policy: PolicySource,
    pub enrichment: EnrichmentConfig,
    pub enforcement: EnforcementConfig,
    pub logging: LoggingConfig,
}

/// Where the policy configuration comes from.
///
/// With `use_defaults`, policies from `file` replace the built-in policy of
/// the same resource type and leave the others in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySource {
    /// JSON (`.json`) or TOML policy document.
    pub file: Option<PathBuf>,
    pub use_defaults: bool,
}

impl Default for PolicySource {
    fn default() -> Self {
        Self {
            file: None,
            use_defaults: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub failure_mode: EnrichmentFailureMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    /// Log every access decision.
    pub audit: bool,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self { audit: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, e.g. `info,supplyhub_abac=debug`.
    /// `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl SupplyhubConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Checks settings that deserialize fine but cannot work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.policy.use_defaults && self.policy.file.is_none() {
            return Err(ConfigError::ValidationError(
                "policy.file is required when policy.use_defaults is false".to_string(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if let Some(file) = self.policy.file.as_mut() {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }

    /// Builds the policy configuration these settings describe.
    pub fn load_policy(&self) -> Result<PolicyConfiguration, ConfigError> {
        let mut policies = if self.policy.use_defaults {
            default_policy_config()
        } else {
            PolicyConfiguration::new()
        };

        if let Some(file) = &self.policy.file {
            let document = PolicyConfiguration::load_file(file)?;
            tracing::debug!(
                path = %file.display(),
                resource_types = document.len(),
                "Policy document loaded"
            );
            for policy in document.policies() {
                policies.insert(policy.clone());
            }
        }

        policies.validate()?;
        Ok(policies)
    }

    /// Serializes the settings as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use supplyhub_abac::{Action, Permission};
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SupplyhubConfig::default();
        assert!(config.policy.use_defaults);
        assert!(config.policy.file.is_none());
        assert_eq!(
            config.enrichment.failure_mode,
            EnrichmentFailureMode::FailSoft
        );
        assert!(config.enforcement.audit);
        assert_eq!(config.logging.filter, "info");
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_validation() {
        let mut config = SupplyhubConfig::default();
        config.policy.use_defaults = false;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = SupplyhubConfig::default();
        config.logging.filter = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = SupplyhubConfig::default();
        config.policy.file = Some(PathBuf::from("policies/supplyhub.toml"));
        config.resolve_paths("/srv/supplyhub");

        assert_eq!(
            config.policy.file,
            Some(PathBuf::from("/srv/supplyhub/policies/supplyhub.toml"))
        );
    }

    #[test]
    fn test_load_default_policy() {
        let policies = SupplyhubConfig::default()
            .load_policy()
            .expect("default policy");
        assert_eq!(policies, default_policy_config());
    }

    #[test]
    fn test_policy_file_overrides_matching_resource_type() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("policy.json");
        fs::write(
            &file,
            r#"{
                "supplier": {
                    "resource_type": "supplier",
                    "role_permissions": {"SUPPLIER": {"delete": true}}
                }
            }"#,
        )
        .expect("Failed to write policy");

        let mut config = SupplyhubConfig::default();
        config.policy.file = Some(file);
        let policies = config.load_policy().expect("merged policy");

        let supplier = policies.policy("supplier").expect("supplier policy");
        assert!(supplier.role("ADMIN").is_none(), "whole policy replaced");
        assert_eq!(
            supplier.role("SUPPLIER").and_then(|t| t.get(Action::Delete)),
            Some(&Permission::allow())
        );
        assert!(policies.policy("document").is_some(), "others kept");
    }

    #[test]
    fn test_policy_file_without_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("policy.toml");
        fs::write(
            &file,
            r#"
[contract]
resource_type = "contract"

[contract.role_permissions.ADMIN]
view = true
"#,
        )
        .expect("Failed to write policy");

        let mut config = SupplyhubConfig::default();
        config.policy.use_defaults = false;
        config.policy.file = Some(file);
        let policies = config.load_policy().expect("policy");

        assert_eq!(policies.resource_types().collect::<Vec<_>>(), vec!["contract"]);
    }

    #[test]
    fn test_missing_policy_file() {
        let mut config = SupplyhubConfig::default();
        config.policy.file = Some(PathBuf::from("/nonexistent/policy.toml"));
        assert!(matches!(config.load_policy(), Err(ConfigError::Policy(_))));
    }

    #[test]
    fn test_toml_output() {
        let toml = SupplyhubConfig::default()
            .to_toml_string()
            .expect("serialize");
        assert!(toml.contains("failure_mode = \"fail-soft\""));
        assert!(toml.contains("audit = true"));
    }
}
