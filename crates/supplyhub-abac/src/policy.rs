//! ABAC policy definitions.
//!
//! A [`PolicyConfiguration`] maps resource types to [`ResourcePolicy`]
//! tables; each table maps role names to [`RolePermissions`], which map
//! actions to a [`Permission`].
//!
//! Policies are data. Adding a resource type means adding a table, not
//! touching the evaluator.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attributes::Action;
use crate::error::{AbacError, Result};
use crate::rule::Permission;

// ============================================================================
// RolePermissions
// ============================================================================

/// Action-to-permission table for one role within one resource policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolePermissions(BTreeMap<Action, Permission>);

impl RolePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table granting every action.
    pub fn allow_all() -> Self {
        Self(
            Action::ALL
                .into_iter()
                .map(|action| (action, Permission::allow()))
                .collect(),
        )
    }

    /// Sets the permission for an action (builder pattern).
    pub fn with(mut self, action: Action, permission: impl Into<Permission>) -> Self {
        self.0.insert(action, permission.into());
        self
    }

    /// Returns the permission for an action, if the role has an entry.
    pub fn get(&self, action: Action) -> Option<&Permission> {
        self.0.get(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Action, &Permission)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// ResourcePolicy
// ============================================================================

/// The role permission tables for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    /// The resource type this policy governs, e.g. `supplier`.
    pub resource_type: String,
    /// Permission tables keyed by role name.
    #[serde(default)]
    pub role_permissions: BTreeMap<String, RolePermissions>,
}

impl ResourcePolicy {
    /// Creates an empty policy (denies everything).
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            role_permissions: BTreeMap::new(),
        }
    }

    /// Adds a role table (builder pattern). Replaces an existing table for the role.
    pub fn with_role(mut self, role: impl Into<String>, permissions: RolePermissions) -> Self {
        self.role_permissions.insert(role.into(), permissions);
        self
    }

    /// Returns the permission table for a role.
    pub fn role(&self, role: &str) -> Option<&RolePermissions> {
        self.role_permissions.get(role)
    }
}

// ============================================================================
// PolicyConfiguration
// ============================================================================

/// Resource policies keyed by resource type.
///
/// Replaced as a whole document; see [`PolicyStore`](crate::store::PolicyStore).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyConfiguration(BTreeMap<String, ResourcePolicy>);

impl PolicyConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource policy keyed by its resource type (builder pattern).
    pub fn with_policy(mut self, policy: ResourcePolicy) -> Self {
        self.insert(policy);
        self
    }

    /// Inserts a resource policy, replacing any policy for the same type.
    pub fn insert(&mut self, policy: ResourcePolicy) {
        self.0.insert(policy.resource_type.clone(), policy);
    }

    /// Returns the policy for a resource type.
    pub fn policy(&self, resource_type: &str) -> Option<&ResourcePolicy> {
        self.0.get(resource_type)
    }

    /// Resource types with a policy, in sorted order.
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn policies(&self) -> impl Iterator<Item = &ResourcePolicy> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks structural consistency of a loaded document.
    ///
    /// Every key must match the embedded `resource_type`, and resource
    /// types and role names must be non-empty.
    pub fn validate(&self) -> Result<()> {
        for (key, policy) in &self.0 {
            if key.trim().is_empty() {
                return Err(AbacError::InvalidPolicy(
                    "resource type must not be empty".to_string(),
                ));
            }
            if *key != policy.resource_type {
                return Err(AbacError::InvalidPolicy(format!(
                    "policy keyed as '{key}' declares resource_type '{}'",
                    policy.resource_type
                )));
            }
            if let Some(role) = policy.role_permissions.keys().find(|r| r.trim().is_empty()) {
                return Err(AbacError::InvalidPolicy(format!(
                    "policy '{key}' has an empty role name {role:?}"
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON policy document.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(input).map_err(|e| AbacError::PolicyParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a TOML policy document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| AbacError::PolicyParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a policy document, choosing the format by extension
    /// (`.json`, anything else is read as TOML).
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| AbacError::PolicyIo {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AbacError::PolicyParse(e.to_string()))
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AbacError::PolicyParse(e.to_string()))
    }
}

impl FromIterator<ResourcePolicy> for PolicyConfiguration {
    fn from_iter<I: IntoIterator<Item = ResourcePolicy>>(iter: I) -> Self {
        let mut config = Self::new();
        for policy in iter {
            config.insert(policy);
        }
        config
    }
}

// ============================================================================
// Tests
// ============================================================================
