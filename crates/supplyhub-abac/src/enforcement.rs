//! Policy enforcement.
//!
//! Turns evaluator decisions into `Result`s for request handlers and keeps
//! an audit trail of every decision.

use std::sync::Arc;

use tracing::{info, warn};

use crate::attributes::{Action, ContextAttributes, ResourceAttributes, SubjectAttributes};
use crate::error::{AbacError, Result};
use crate::evaluator::{AccessControlResult, PolicyEvaluator};

/// Policy enforcement engine.
///
/// Cloning is cheap; clones share the evaluator and therefore see the same
/// policy replacements.
#[derive(Debug, Clone)]
pub struct PolicyEnforcer {
    evaluator: Arc<PolicyEvaluator>,

    /// Whether to log access decisions.
    audit_enabled: bool,
}

impl PolicyEnforcer {
    /// Creates a new policy enforcer.
    pub fn new(evaluator: Arc<PolicyEvaluator>) -> Self {
        Self {
            evaluator,
            audit_enabled: true,
        }
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn evaluator(&self) -> &Arc<PolicyEvaluator> {
        &self.evaluator
    }

    /// Authorizes an action.
    ///
    /// Returns the granting decision, or [`AbacError::AccessDenied`] carrying
    /// the evaluator's reason. Callers answering untrusted clients should
    /// reply with [`AbacError::public_message`] rather than the reason.
    ///
    /// **Audit:** Logs every decision.
    pub fn authorize(
        &self,
        resource_type: &str,
        action: Action,
        subject: &SubjectAttributes,
        resource: Option<&ResourceAttributes>,
        context: Option<&ContextAttributes>,
    ) -> Result<AccessControlResult> {
        let result = self
            .evaluator
            .evaluate(resource_type, action, subject, resource, context);

        if self.audit_enabled {
            if result.granted {
                info!(
                    subject = %subject.id,
                    resource_type = %resource_type,
                    action = %action,
                    resource = resource.map(|r| r.id.as_str()),
                    matched_role = result.matched_role.as_deref(),
                    "Access granted"
                );
            } else {
                warn!(
                    subject = %subject.id,
                    resource_type = %resource_type,
                    action = %action,
                    resource = resource.map(|r| r.id.as_str()),
                    reason = result.reason.as_deref(),
                    "Access denied"
                );
            }
        }

        if result.granted {
            Ok(result)
        } else {
            Err(AbacError::AccessDenied {
                resource_type: resource_type.to_string(),
                action,
                reason: result
                    .reason
                    .unwrap_or_else(|| "denied by policy".to_string()),
            })
        }
    }

    /// Like [`PolicyEnforcer::authorize`], for an action given as text.
    ///
    /// # Errors
    ///
    /// [`AbacError::UnknownAction`] for text outside the action set.
    pub fn authorize_named(
        &self,
        resource_type: &str,
        action: &str,
        subject: &SubjectAttributes,
        resource: Option<&ResourceAttributes>,
        context: Option<&ContextAttributes>,
    ) -> Result<AccessControlResult> {
        let action: Action = action.parse()?;
        self.authorize(resource_type, action, subject, resource, context)
    }
}

impl Default for PolicyEnforcer {
    /// An enforcer over the built-in policy set.
    fn default() -> Self {
        Self::new(Arc::new(PolicyEvaluator::default()))
    }
}
