//! Error types for attribute extraction, policy loading and enforcement.
//!
//! Evaluation itself never fails: missing policies and failing predicates
//! are folded into a denied [`AccessControlResult`](crate::AccessControlResult).
//! The errors here cover the edges around it.

use std::path::PathBuf;

use thiserror::Error;

use crate::attributes::Action;

/// Error type for the ABAC crate.
#[derive(Debug, Error)]
pub enum AbacError {
    /// A resource record carried no identifiable `id`.
    #[error("Invalid resource: {reason}")]
    InvalidResource { reason: String },

    /// An action string outside the closed action set.
    #[error("Unknown action: {0:?}")]
    UnknownAction(String),

    /// A policy document failed validation.
    #[error("Invalid policy configuration: {0}")]
    InvalidPolicy(String),

    /// A policy document could not be parsed.
    #[error("Failed to parse policy document: {0}")]
    PolicyParse(String),

    /// A policy document could not be read.
    #[error("Failed to read policy file at {path}: {source}")]
    PolicyIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Subject enrichment failed and the extractor is configured to fail closed.
    #[error("Subject enrichment failed for principal {principal_id}: {source}")]
    EnrichmentFailed {
        principal_id: String,
        source: DirectoryError,
    },

    /// The evaluator denied the request.
    #[error("Access denied: {action} on {resource_type}: {reason}")]
    AccessDenied {
        resource_type: String,
        action: Action,
        reason: String,
    },
}

impl AbacError {
    /// Message that is safe to show to an untrusted caller.
    ///
    /// Denial reasons name roles and rules, so they stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "Insufficient permissions",
            Self::InvalidResource { .. } => "Invalid resource",
            Self::UnknownAction(_) => "Unsupported action",
            Self::InvalidPolicy(_)
            | Self::PolicyParse(_)
            | Self::PolicyIo { .. }
            | Self::EnrichmentFailed { .. } => "Authorization unavailable",
        }
    }

    /// HTTP status code the enforcement layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AccessDenied { .. } => 403,
            Self::InvalidResource { .. } | Self::UnknownAction(_) => 400,
            Self::InvalidPolicy(_)
            | Self::PolicyParse(_)
            | Self::PolicyIo { .. }
            | Self::EnrichmentFailed { .. } => 500,
        }
    }
}

/// Result type for ABAC operations.
pub type Result<T> = std::result::Result<T, AbacError>;

/// Failure of a single rule evaluation.
///
/// Never leaves the evaluator; the role whose rule failed is treated as
/// not granting the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// The rule inspects the resource but none was supplied.
    #[error("rule requires a resource but none was supplied")]
    MissingResource,

    /// The rule inspects the context but none was supplied.
    #[error("rule requires a context but none was supplied")]
    MissingContext,

    /// The rule reads a resource attribute that is absent.
    #[error("resource attribute {0:?} is missing")]
    MissingAttribute(String),
}

/// Failure of a role-directory lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The backing store could not be reached.
    #[error("role directory unavailable: {0}")]
    Unavailable(String),

    /// The lookup ran but failed.
    #[error("role directory lookup failed: {0}")]
    LookupFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_message_hides_reason() {
        let err = AbacError::AccessDenied {
            resource_type: "supplier".to_string(),
            action: Action::Delete,
            reason: "role SUPPLIER explicitly denied".to_string(),
        };
        assert!(err.to_string().contains("SUPPLIER"));
        assert_eq!(err.public_message(), "Insufficient permissions");
        assert!(!err.public_message().contains("SUPPLIER"));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_status_codes() {
        let invalid = AbacError::InvalidResource {
            reason: "missing id".to_string(),
        };
        assert_eq!(invalid.status_code(), 400);
        assert_eq!(AbacError::InvalidPolicy("x".to_string()).status_code(), 500);
    }
}
