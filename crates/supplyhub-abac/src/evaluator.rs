//! ABAC policy evaluation engine.
//!
//! Looks up the policy for the resource type and walks the subject's roles.
//! The first role whose permission holds grants access; explicit denials
//! and failing rules only rule out their own role. The result is the union
//! of what the subject's roles permit.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::attributes::{Action, ContextAttributes, ResourceAttributes, SubjectAttributes};
use crate::error::Result;
use crate::policy::PolicyConfiguration;
use crate::rule::Permission;
use crate::store::PolicyStore;

// ============================================================================
// AccessControlResult
// ============================================================================

/// The result of evaluating an access request.
///
/// `reason` is meant for logs; do not show it to untrusted callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlResult {
    /// Whether access is granted.
    pub granted: bool,
    /// Human-readable explanation of the decision.
    pub reason: Option<String>,
    /// The resource type evaluated.
    pub resource_type: Option<String>,
    /// The action evaluated.
    pub action: Option<Action>,
    /// The role that granted access, if any.
    pub matched_role: Option<String>,
}

impl AccessControlResult {
    fn grant(resource_type: &str, action: Action, role: &str) -> Self {
        Self {
            granted: true,
            reason: Some(format!("Role '{role}' permits '{action}' on '{resource_type}'")),
            resource_type: Some(resource_type.to_string()),
            action: Some(action),
            matched_role: Some(role.to_string()),
        }
    }

    fn deny(resource_type: &str, action: Action, reason: String) -> Self {
        Self {
            granted: false,
            reason: Some(reason),
            resource_type: Some(resource_type.to_string()),
            action: Some(action),
            matched_role: None,
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Evaluates an access request against a configuration.
///
/// # Postcondition
///
/// Always returns a result: a missing policy, a role without an entry for
/// the action, and a failing rule all end in denial, never in a panic or
/// an error.
pub fn evaluate(
    config: &PolicyConfiguration,
    resource_type: &str,
    action: Action,
    subject: &SubjectAttributes,
    resource: Option<&ResourceAttributes>,
    context: Option<&ContextAttributes>,
) -> AccessControlResult {
    let Some(policy) = config.policy(resource_type) else {
        return AccessControlResult::deny(
            resource_type,
            action,
            format!("No policy configured for resource type '{resource_type}'"),
        );
    };

    let mut explicitly_denied: Vec<&str> = Vec::new();
    let mut failed: Vec<String> = Vec::new();

    for role in &subject.roles {
        let Some(permission) = policy.role(role).and_then(|table| table.get(action)) else {
            continue;
        };

        match permission {
            Permission::Always(true) => {
                return AccessControlResult::grant(resource_type, action, role);
            }
            Permission::Always(false) => explicitly_denied.push(role),
            Permission::Rule(rule) => match rule.evaluate(subject, resource, context) {
                Ok(true) => return AccessControlResult::grant(resource_type, action, role),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        subject = %subject.id,
                        role = %role,
                        resource_type = %resource_type,
                        action = %action,
                        error = %e,
                        "Permission rule failed; treating as denial"
                    );
                    failed.push(format!("{role} ({e})"));
                }
            },
        }
    }

    let mut reason = format!("No applicable role permits '{action}' on '{resource_type}'");
    if !explicitly_denied.is_empty() {
        reason.push_str(&format!("; explicitly denied for: {}", explicitly_denied.join(", ")));
    }
    if !failed.is_empty() {
        reason.push_str(&format!("; rule failed for: {}", failed.join(", ")));
    }

    AccessControlResult::deny(resource_type, action, reason)
}

// ============================================================================
// PolicyEvaluator
// ============================================================================

/// Evaluator bound to a replaceable [`PolicyStore`].
///
/// Each evaluation reads the configuration once, so a concurrent
/// replacement never mixes rules from two documents. Share it across
/// requests behind an `Arc`.
#[derive(Debug, Default)]
pub struct PolicyEvaluator {
    store: PolicyStore,
}

impl PolicyEvaluator {
    /// Creates an evaluator over `config`.
    pub fn new(config: PolicyConfiguration) -> Self {
        Self {
            store: PolicyStore::new(config),
        }
    }

    /// Creates an evaluator over an existing store.
    pub fn with_store(store: PolicyStore) -> Self {
        Self { store }
    }

    /// Evaluates an access request against the current configuration.
    pub fn evaluate(
        &self,
        resource_type: &str,
        action: Action,
        subject: &SubjectAttributes,
        resource: Option<&ResourceAttributes>,
        context: Option<&ContextAttributes>,
    ) -> AccessControlResult {
        let config = self.store.snapshot();
        let result = evaluate(&config, resource_type, action, subject, resource, context);

        debug!(
            subject = %subject.id,
            resource_type = %resource_type,
            action = %action,
            resource = resource.map(|r| r.id.as_str()),
            granted = result.granted,
            matched_role = result.matched_role.as_deref(),
            "Access evaluated"
        );

        result
    }

    /// Returns the current configuration.
    pub fn policy_config(&self) -> Arc<PolicyConfiguration> {
        self.store.snapshot()
    }

    /// Replaces the whole configuration. Returns the previous one.
    pub fn update_policy_config(
        &self,
        config: PolicyConfiguration,
    ) -> Result<Arc<PolicyConfiguration>> {
        self.store.replace(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
