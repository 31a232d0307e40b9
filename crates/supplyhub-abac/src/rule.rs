//! Permission rules.
//!
//! A [`Permission`] is either a constant or a [`Rule`]. Rules are named,
//! pure predicates over the request attributes, so a policy table stays
//! plain data that can be serialized, diffed and tested in isolation.

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeValue, ContextAttributes, ResourceAttributes, SubjectAttributes};
use crate::error::PredicateError;

// ============================================================================
// Permission
// ============================================================================

/// The permission one role has for one action.
///
/// Serialized untagged: a policy document writes `true`, `false` or a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Permission {
    /// Constant grant or denial, independent of the request.
    Always(bool),
    /// Grant depends on the request attributes.
    Rule(Rule),
}

impl Permission {
    pub fn allow() -> Self {
        Self::Always(true)
    }

    pub fn deny() -> Self {
        Self::Always(false)
    }
}

impl From<bool> for Permission {
    fn from(value: bool) -> Self {
        Self::Always(value)
    }
}

impl From<Rule> for Permission {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A named predicate over subject, resource and context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    // -- Tenant scoping --
    /// Subject and resource belong to the same organization.
    /// False when either side has no organization.
    SameOrganization,
    /// The resource is the subject's own organization record.
    OwnOrganization,

    // -- Ownership --
    /// The subject owns the resource.
    IsOwner,
    /// The resource is the subject's own record.
    IsSelf,
    /// The named resource attribute holds the subject's id.
    SubjectMatchesAttribute(String),

    // -- Resource state --
    /// Resource status is one of the listed values.
    StatusIn(Vec<String>),
    /// Resource status is none of the listed values.
    StatusNotIn(Vec<String>),
    /// The named resource attribute equals the value.
    AttributeEquals { key: String, value: AttributeValue },

    // -- Subject --
    /// The subject also holds the named role.
    HasRole(String),

    // -- Context --
    /// The request happens during business hours (09:00-17:00 UTC, weekdays).
    BusinessHoursOnly,

    // -- Logical combinators --
    /// All sub-rules must hold.
    All(Vec<Rule>),
    /// At least one sub-rule must hold.
    Any(Vec<Rule>),
    /// The sub-rule must not hold.
    Not(Box<Rule>),
}

impl Rule {
    /// Shorthand for [`Rule::StatusIn`].
    pub fn status_in(statuses: &[&str]) -> Self {
        Self::StatusIn(statuses.iter().map(|s| (*s).to_string()).collect())
    }

    /// Shorthand for [`Rule::StatusNotIn`].
    pub fn status_not_in(statuses: &[&str]) -> Self {
        Self::StatusNotIn(statuses.iter().map(|s| (*s).to_string()).collect())
    }

    /// Shorthand for [`Rule::SubjectMatchesAttribute`].
    pub fn subject_matches(key: &str) -> Self {
        Self::SubjectMatchesAttribute(key.to_string())
    }

    /// Negates a rule.
    #[allow(clippy::should_implement_trait)]
    pub fn not(rule: Rule) -> Self {
        Self::Not(Box::new(rule))
    }

    /// Evaluates the rule.
    ///
    /// Errors propagate through combinators in evaluation order; `Not`
    /// never turns an error into `true`. `All` and `Any` short-circuit, so
    /// a sub-rule after the deciding one is not evaluated.
    pub fn evaluate(
        &self,
        subject: &SubjectAttributes,
        resource: Option<&ResourceAttributes>,
        context: Option<&ContextAttributes>,
    ) -> Result<bool, PredicateError> {
        match self {
            Rule::SameOrganization => {
                let resource = require_resource(resource)?;
                Ok(match (&subject.organization_id, &resource.organization_id) {
                    (Some(s), Some(r)) => s == r,
                    _ => false,
                })
            }
            Rule::OwnOrganization => {
                let resource = require_resource(resource)?;
                Ok(subject.organization_id.as_deref() == Some(resource.id.as_str()))
            }
            Rule::IsOwner => {
                let resource = require_resource(resource)?;
                Ok(resource.owner_id.as_deref() == Some(subject.id.as_str()))
            }
            Rule::IsSelf => Ok(require_resource(resource)?.id == subject.id),
            Rule::SubjectMatchesAttribute(key) => {
                let value = require_attribute(require_resource(resource)?, key)?;
                Ok(value.as_identifier().as_deref() == Some(subject.id.as_str()))
            }
            Rule::StatusIn(statuses) => {
                let resource = require_resource(resource)?;
                Ok(resource
                    .status
                    .as_ref()
                    .is_some_and(|status| statuses.contains(status)))
            }
            Rule::StatusNotIn(statuses) => {
                let resource = require_resource(resource)?;
                Ok(resource
                    .status
                    .as_ref()
                    .is_none_or(|status| !statuses.contains(status)))
            }
            Rule::AttributeEquals { key, value } => {
                Ok(require_attribute(require_resource(resource)?, key)? == value)
            }
            Rule::HasRole(role) => Ok(subject.has_role(role)),
            Rule::BusinessHoursOnly => context
                .map(ContextAttributes::is_business_hours)
                .ok_or(PredicateError::MissingContext),
            Rule::All(rules) => {
                for rule in rules {
                    if !rule.evaluate(subject, resource, context)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::Any(rules) => {
                for rule in rules {
                    if rule.evaluate(subject, resource, context)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Rule::Not(rule) => Ok(!rule.evaluate(subject, resource, context)?),
        }
    }
}

fn require_resource(
    resource: Option<&ResourceAttributes>,
) -> Result<&ResourceAttributes, PredicateError> {
    resource.ok_or(PredicateError::MissingResource)
}

fn require_attribute<'a>(
    resource: &'a ResourceAttributes,
    key: &str,
) -> Result<&'a AttributeValue, PredicateError> {
    resource
        .extra(key)
        .ok_or_else(|| PredicateError::MissingAttribute(key.to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::PrincipalType;
    use chrono::{TimeZone, Utc};

    fn employee(id: &str, org: &str) -> SubjectAttributes {
        SubjectAttributes::new(id, PrincipalType::Employee).with_organization(org)
    }

    #[test]
    fn test_same_organization() {
        let resource = ResourceAttributes::new("sup1").with_organization("org-a");

        assert_eq!(
            Rule::SameOrganization.evaluate(&employee("u1", "org-a"), Some(&resource), None),
            Ok(true)
        );
        assert_eq!(
            Rule::SameOrganization.evaluate(&employee("u1", "org-b"), Some(&resource), None),
            Ok(false)
        );
    }

    #[test]
    fn test_same_organization_requires_both_sides() {
        let subject = SubjectAttributes::new("u1", PrincipalType::Employee);
        let resource = ResourceAttributes::new("sup1");
        assert_eq!(
            Rule::SameOrganization.evaluate(&subject, Some(&resource), None),
            Ok(false),
            "two missing organizations must not count as the same organization"
        );
    }

    #[test]
    fn test_own_organization() {
        let subject = employee("u1", "org-a");
        assert_eq!(
            Rule::OwnOrganization.evaluate(&subject, Some(&ResourceAttributes::new("org-a")), None),
            Ok(true)
        );
        assert_eq!(
            Rule::OwnOrganization.evaluate(&subject, Some(&ResourceAttributes::new("org-b")), None),
            Ok(false)
        );
    }

    #[test]
    fn test_is_owner_and_is_self() {
        let subject = SubjectAttributes::new("s1", PrincipalType::Supplier);
        let owned = ResourceAttributes::new("doc1").with_owner("s1");
        let own_record = ResourceAttributes::new("s1");

        assert_eq!(Rule::IsOwner.evaluate(&subject, Some(&owned), None), Ok(true));
        assert_eq!(Rule::IsOwner.evaluate(&subject, Some(&own_record), None), Ok(false));
        assert_eq!(Rule::IsSelf.evaluate(&subject, Some(&own_record), None), Ok(true));
        assert_eq!(Rule::IsSelf.evaluate(&subject, Some(&owned), None), Ok(false));
    }

    #[test]
    fn test_missing_resource_is_an_error() {
        let subject = employee("u1", "org-a");
        assert_eq!(
            Rule::IsOwner.evaluate(&subject, None, None),
            Err(PredicateError::MissingResource)
        );
        assert_eq!(
            Rule::SameOrganization.evaluate(&subject, None, None),
            Err(PredicateError::MissingResource)
        );
    }

    #[test]
    fn test_subject_matches_attribute() {
        let subject = SubjectAttributes::new("s1", PrincipalType::Supplier);
        let site = ResourceAttributes::new("site1").with_extra("supplierId", "s1");
        let numeric = ResourceAttributes::new("site2").with_extra("supplierId", 5_i64);
        let rule = Rule::subject_matches("supplierId");

        assert_eq!(rule.evaluate(&subject, Some(&site), None), Ok(true));
        assert_eq!(rule.evaluate(&subject, Some(&numeric), None), Ok(false));
        assert_eq!(
            rule.evaluate(&subject, Some(&ResourceAttributes::new("site3")), None),
            Err(PredicateError::MissingAttribute("supplierId".to_string()))
        );
    }

    #[test]
    fn test_status_rules() {
        let subject = employee("u1", "org-a");
        let draft = ResourceAttributes::new("r1").with_status("DRAFT");
        let no_status = ResourceAttributes::new("r2");

        assert_eq!(
            Rule::status_in(&["DRAFT"]).evaluate(&subject, Some(&draft), None),
            Ok(true)
        );
        assert_eq!(
            Rule::status_in(&["DRAFT"]).evaluate(&subject, Some(&no_status), None),
            Ok(false)
        );
        assert_eq!(
            Rule::status_not_in(&["INACTIVE", "REJECTED"]).evaluate(&subject, Some(&draft), None),
            Ok(true)
        );
        assert_eq!(
            Rule::status_not_in(&["INACTIVE"]).evaluate(&subject, Some(&no_status), None),
            Ok(true)
        );
    }

    #[test]
    fn test_attribute_equals() {
        let subject = employee("u1", "org-a");
        let rule = Rule::AttributeEquals {
            key: "category".to_string(),
            value: AttributeValue::from("RAW_MATERIALS"),
        };
        let resource = ResourceAttributes::new("sup1").with_extra("category", "RAW_MATERIALS");
        assert_eq!(rule.evaluate(&subject, Some(&resource), None), Ok(true));
    }

    #[test]
    fn test_business_hours_requires_context() {
        let subject = employee("u1", "org-a");
        let weekday = ContextAttributes::at(Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap());

        assert_eq!(Rule::BusinessHoursOnly.evaluate(&subject, None, Some(&weekday)), Ok(true));
        assert_eq!(
            Rule::BusinessHoursOnly.evaluate(&subject, None, None),
            Err(PredicateError::MissingContext)
        );
    }

    #[test]
    fn test_combinators() {
        let subject = employee("u1", "org-a").with_role("APPROVER");
        let resource = ResourceAttributes::new("r1")
            .with_organization("org-a")
            .with_status("PENDING_APPROVAL");

        let all = Rule::All(vec![Rule::SameOrganization, Rule::status_in(&["PENDING_APPROVAL"])]);
        let any = Rule::Any(vec![Rule::IsOwner, Rule::HasRole("APPROVER".to_string())]);
        let not = Rule::not(Rule::IsOwner);

        assert_eq!(all.evaluate(&subject, Some(&resource), None), Ok(true));
        assert_eq!(any.evaluate(&subject, Some(&resource), None), Ok(true));
        assert_eq!(not.evaluate(&subject, Some(&resource), None), Ok(true));
        assert_eq!(Rule::All(vec![]).evaluate(&subject, None, None), Ok(true));
        assert_eq!(Rule::Any(vec![]).evaluate(&subject, None, None), Ok(false));
    }

    #[test]
    fn test_not_does_not_mask_errors() {
        let subject = employee("u1", "org-a");
        let rule = Rule::not(Rule::subject_matches("requestedById"));
        let resource = ResourceAttributes::new("req1");
        assert_eq!(
            rule.evaluate(&subject, Some(&resource), None),
            Err(PredicateError::MissingAttribute("requestedById".to_string()))
        );
    }

    #[test]
    fn test_all_short_circuits_before_error() {
        let subject = employee("u1", "org-a");
        let resource = ResourceAttributes::new("req1").with_status("ACTIVE");
        let rule = Rule::All(vec![
            Rule::status_in(&["DRAFT"]),
            Rule::subject_matches("requestedById"),
        ]);
        assert_eq!(rule.evaluate(&subject, Some(&resource), None), Ok(false));
    }

    #[test]
    fn test_permission_serde_shapes() {
        let allow: Permission = serde_json::from_str("true").unwrap();
        assert_eq!(allow, Permission::allow());

        let unit: Permission = serde_json::from_str("\"same_organization\"").unwrap();
        assert_eq!(unit, Permission::Rule(Rule::SameOrganization));

        let nested: Permission =
            serde_json::from_str(r#"{"all": ["is_owner", {"status_in": ["DRAFT"]}]}"#).unwrap();
        assert_eq!(
            nested,
            Permission::Rule(Rule::All(vec![Rule::IsOwner, Rule::status_in(&["DRAFT"])]))
        );
    }

    #[test]
    fn test_rule_serialization_roundtrip() {
        let rule = Rule::All(vec![
            Rule::SameOrganization,
            Rule::not(Rule::subject_matches("requestedById")),
        ]);
        let json = serde_json::to_string(&rule).expect("serialize rule");
        let deserialized: Rule = serde_json::from_str(&json).expect("deserialize rule");
        assert_eq!(rule, deserialized);
    }
}
