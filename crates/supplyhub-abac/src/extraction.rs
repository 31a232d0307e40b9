//! Attribute extraction.
//!
//! Converts raw principal and resource records into the attribute bundles
//! the evaluator consumes. Subject extraction may consult a
//! [`RoleDirectory`]; resource and context extraction are pure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::attributes::{
    AttributeValue, ContextAttributes, ExtraAttributes, PartialContext, PrincipalType,
    ResourceAttributes, SubjectAttributes,
};
use crate::directory::{EmployeeRecord, RoleDirectory};
use crate::error::{AbacError, DirectoryError, Result};

const ROLES_KEY: &str = "roles";
const ORGANIZATION_KEYS: [&str; 2] = ["organizationId", "organization_id"];
const OWNER_KEYS: [&str; 2] = ["ownerId", "owner_id"];
const CREATOR_KEYS: [&str; 3] = ["createdById", "createdBy", "created_by"];
const STATUS_KEY: &str = "status";

// ============================================================================
// Principal
// ============================================================================

/// The authenticated caller as handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalRecord {
    pub id: String,
    pub principal_type: PrincipalType,
    /// Open-ended claims. A `roles` entry (array or comma-separated string)
    /// seeds the role set.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl PrincipalRecord {
    pub fn new(id: impl Into<String>, principal_type: PrincipalType) -> Self {
        Self {
            id: id.into(),
            principal_type,
            attributes: Map::new(),
        }
    }

    /// Adds a claim (builder pattern).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Subject extraction
// ============================================================================

/// What subject extraction does when a directory lookup fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentFailureMode {
    /// Log the failure and continue with the attributes already known.
    #[default]
    FailSoft,
    /// Return [`AbacError::EnrichmentFailed`].
    FailClosed,
}

/// Builds subject attributes, enriching employees through a [`RoleDirectory`].
#[derive(Debug)]
pub struct AttributeExtractor<D> {
    directory: D,
    failure_mode: EnrichmentFailureMode,
}

impl<D: RoleDirectory> AttributeExtractor<D> {
    /// Creates an extractor that fails soft on lookup errors.
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            failure_mode: EnrichmentFailureMode::FailSoft,
        }
    }

    /// Sets the failure mode.
    pub fn with_failure_mode(mut self, failure_mode: EnrichmentFailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Builds the subject attributes for a caller.
    ///
    /// Roles are the union of the claims' `roles`, `explicit_roles` and the
    /// principal type's role. Employees are enriched with their employee
    /// code, organization, org units and org-unit roles; `employee` skips
    /// the employee lookup when the caller already has the record.
    ///
    /// # Errors
    ///
    /// Only in [`EnrichmentFailureMode::FailClosed`], when a directory
    /// lookup fails.
    pub async fn build_subject_attributes(
        &self,
        principal: &PrincipalRecord,
        employee: Option<&EmployeeRecord>,
        explicit_roles: Option<&[String]>,
    ) -> Result<SubjectAttributes> {
        let mut subject = SubjectAttributes::new(&principal.id, principal.principal_type);
        subject.roles.extend(embedded_roles(&principal.attributes));
        if let Some(roles) = explicit_roles {
            subject.roles.extend(
                roles
                    .iter()
                    .map(|r| r.trim())
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
            );
        }
        subject.organization_id =
            first_identifier(&principal.attributes, &ORGANIZATION_KEYS).map(|(_, id)| id);
        subject.extra = scalar_attributes(&principal.attributes, &[ROLES_KEY]);

        if principal.principal_type == PrincipalType::Employee {
            if let Err(source) = self.enrich_employee(&mut subject, employee).await {
                match self.failure_mode {
                    EnrichmentFailureMode::FailSoft => warn!(
                        principal = %principal.id,
                        error = %source,
                        "Employee role resolution failed; continuing with partial attributes"
                    ),
                    EnrichmentFailureMode::FailClosed => {
                        return Err(AbacError::EnrichmentFailed {
                            principal_id: principal.id.clone(),
                            source,
                        });
                    }
                }
            }
        }

        debug!(
            principal = %subject.id,
            roles = ?subject.roles,
            organization = subject.organization_id.as_deref(),
            "Subject attributes built"
        );
        Ok(subject)
    }

    /// Fills employee fields in place, so a later failing lookup keeps
    /// whatever an earlier one resolved.
    async fn enrich_employee(
        &self,
        subject: &mut SubjectAttributes,
        employee: Option<&EmployeeRecord>,
    ) -> std::result::Result<(), DirectoryError> {
        let employee = match employee {
            Some(record) => record.clone(),
            None => match self.directory.find_employee(&subject.id).await? {
                Some(record) => record,
                None => {
                    debug!(principal = %subject.id, "No employee record for principal");
                    return Ok(());
                }
            },
        };

        subject.employee_code.clone_from(&employee.employee_code);
        if employee.organization_id.is_some() {
            subject.organization_id.clone_from(&employee.organization_id);
        }

        for assignment in self.directory.role_assignments(&employee.id).await? {
            subject.org_unit_ids.insert(assignment.org_unit_id);
            subject.roles.insert(assignment.role_name);
            if let Some(code) = assignment.role_code {
                subject.roles.insert(code);
            }
        }
        Ok(())
    }
}

fn embedded_roles(attributes: &Map<String, Value>) -> Vec<String> {
    let roles: Vec<String> = match attributes.get(ROLES_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    roles
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

// ============================================================================
// Resource extraction
// ============================================================================

/// Builds resource attributes from any resource-shaped JSON record.
///
/// Every scalar property other than the id and the organization, owner and
/// status fields actually used is copied into `extra`; arrays and objects
/// are skipped.
///
/// # Errors
///
/// [`AbacError::InvalidResource`] when the record is not an object or has
/// no string or integer `id`.
pub fn build_resource_attributes(raw: &Value) -> Result<ResourceAttributes> {
    let Some(record) = raw.as_object() else {
        return Err(AbacError::InvalidResource {
            reason: "resource record must be an object".to_string(),
        });
    };

    let id = record
        .get("id")
        .and_then(AttributeValue::from_json)
        .and_then(|v| v.as_identifier())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AbacError::InvalidResource {
            reason: "resource record has no identifiable id".to_string(),
        })?;

    let organization = first_identifier(record, &ORGANIZATION_KEYS);
    let owner = first_identifier(record, &OWNER_KEYS)
        .or_else(|| first_identifier(record, &CREATOR_KEYS));
    let status = record
        .get(STATUS_KEY)
        .and_then(Value::as_str)
        .map(str::to_string);

    // Only the keys actually consumed leave `extra`; unused aliases stay.
    let mut consumed: Vec<&str> = vec!["id"];
    consumed.extend(organization.as_ref().map(|(key, _)| *key));
    consumed.extend(owner.as_ref().map(|(key, _)| *key));
    if status.is_some() {
        consumed.push(STATUS_KEY);
    }

    Ok(ResourceAttributes {
        id,
        organization_id: organization.map(|(_, id)| id),
        owner_id: owner.map(|(_, id)| id),
        status,
        extra: scalar_attributes(record, &consumed),
    })
}

// ============================================================================
// Context extraction
// ============================================================================

/// Builds context attributes, defaulting `time_of_day` to now.
pub fn build_context_attributes(partial: Option<PartialContext>) -> ContextAttributes {
    build_context_attributes_at(partial, Utc::now())
}

/// Builds context attributes with an explicit clock reading.
pub fn build_context_attributes_at(
    partial: Option<PartialContext>,
    now: DateTime<Utc>,
) -> ContextAttributes {
    let partial = partial.unwrap_or_default();
    ContextAttributes {
        time_of_day: partial.time_of_day.unwrap_or(now),
        request_ip: partial.request_ip,
        client_type: partial.client_type,
        extra: partial.extra,
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// First alias in `keys` holding an identifier, with the key it came from.
fn first_identifier<'k>(
    record: &Map<String, Value>,
    keys: &[&'k str],
) -> Option<(&'k str, String)> {
    keys.iter().find_map(|key| {
        record
            .get(*key)
            .and_then(AttributeValue::from_json)
            .and_then(|v| v.as_identifier())
            .map(|id| (*key, id))
    })
}

fn scalar_attributes(record: &Map<String, Value>, skip: &[&str]) -> ExtraAttributes {
    record
        .iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .filter_map(|(key, value)| AttributeValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, RoleAssignment};
    use crate::rule::Rule;
    use chrono::TimeZone;
    use serde_json::json;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::new()
            .with_employee(
                "u1",
                EmployeeRecord {
                    id: "e1".to_string(),
                    employee_code: Some("EMP-001".to_string()),
                    organization_id: Some("org-a".to_string()),
                },
            )
            .with_assignment(
                "e1",
                RoleAssignment {
                    org_unit_id: "ou-procurement".to_string(),
                    role_name: "APPROVER".to_string(),
                    role_code: Some("APR".to_string()),
                },
            )
            .with_assignment(
                "e1",
                RoleAssignment {
                    org_unit_id: "ou-finance".to_string(),
                    role_name: "APPROVER".to_string(),
                    role_code: None,
                },
            )
    }

    #[tokio::test]
    async fn test_employee_enrichment() {
        let extractor = AttributeExtractor::new(directory());
        let principal = PrincipalRecord::new("u1", PrincipalType::Employee)
            .with_attribute("roles", json!(["BUYER"]))
            .with_attribute("locale", "de-DE");

        let subject = extractor
            .build_subject_attributes(&principal, None, Some(&["AUDITOR".to_string()]))
            .await
            .unwrap();

        assert_eq!(subject.employee_code.as_deref(), Some("EMP-001"));
        assert_eq!(subject.organization_id.as_deref(), Some("org-a"));
        assert_eq!(
            subject.roles.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["APPROVER", "APR", "AUDITOR", "BUYER", "EMPLOYEE"]
        );
        assert_eq!(subject.org_unit_ids.len(), 2);
        assert_eq!(
            subject.extra.get("locale"),
            Some(&AttributeValue::String("de-DE".to_string()))
        );
        assert!(!subject.extra.contains_key("roles"));
    }

    #[tokio::test]
    async fn test_supplied_employee_record_skips_lookup() {
        let extractor = AttributeExtractor::new(directory());
        let principal = PrincipalRecord::new("u9", PrincipalType::Employee);
        let employee = EmployeeRecord {
            id: "e1".to_string(),
            employee_code: Some("EMP-009".to_string()),
            organization_id: Some("org-b".to_string()),
        };

        let subject = extractor
            .build_subject_attributes(&principal, Some(&employee), None)
            .await
            .unwrap();

        assert_eq!(subject.employee_code.as_deref(), Some("EMP-009"));
        assert_eq!(subject.organization_id.as_deref(), Some("org-b"));
        assert!(subject.has_role("APPROVER"));
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_soft() {
        let dir = directory();
        dir.set_unavailable(true);
        let extractor = AttributeExtractor::new(dir);
        let principal = PrincipalRecord::new("u1", PrincipalType::Employee)
            .with_attribute("roles", "BUYER, ,REVIEWER");

        let subject = extractor
            .build_subject_attributes(&principal, None, None)
            .await
            .expect("fail-soft never errors");

        assert_eq!(
            subject.roles.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["BUYER", "EMPLOYEE", "REVIEWER"]
        );
        assert!(subject.employee_code.is_none());
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let dir = directory();
        dir.set_unavailable(true);
        let extractor =
            AttributeExtractor::new(dir).with_failure_mode(EnrichmentFailureMode::FailClosed);
        let principal = PrincipalRecord::new("u1", PrincipalType::Employee);

        let err = extractor
            .build_subject_attributes(&principal, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AbacError::EnrichmentFailed { principal_id, .. } if principal_id == "u1"));
    }

    #[tokio::test]
    async fn test_non_employee_not_enriched() {
        let extractor = AttributeExtractor::new(directory());
        let principal = PrincipalRecord::new("u1", PrincipalType::Supplier)
            .with_attribute("organizationId", "org-s");

        let subject = extractor
            .build_subject_attributes(&principal, None, None)
            .await
            .unwrap();

        assert_eq!(subject.roles.len(), 1);
        assert!(subject.has_role("SUPPLIER"));
        assert!(subject.employee_code.is_none());
        assert_eq!(subject.organization_id.as_deref(), Some("org-s"));
    }

    #[test]
    fn test_resource_extraction() {
        let raw = json!({
            "id": "sup1",
            "organizationId": "org-a",
            "createdById": "u1",
            "status": "DRAFT",
            "supplierId": "s1",
            "rating": 4,
            "address": {"city": "Berlin"},
            "tags": ["a", "b"]
        });

        let resource = build_resource_attributes(&raw).unwrap();

        assert_eq!(resource.id, "sup1");
        assert_eq!(resource.organization_id.as_deref(), Some("org-a"));
        assert_eq!(resource.owner_id.as_deref(), Some("u1"));
        assert_eq!(resource.status.as_deref(), Some("DRAFT"));
        assert_eq!(resource.extra("supplierId"), Some(&AttributeValue::from("s1")));
        assert_eq!(resource.extra("rating"), Some(&AttributeValue::Integer(4)));
        assert!(resource.extra("address").is_none());
        assert!(resource.extra("tags").is_none());
        assert!(resource.extra("createdById").is_none());
    }

    #[test]
    fn test_owner_preferred_over_creator() {
        let raw = json!({"id": 7, "ownerId": "u2", "createdBy": "u1"});
        let resource = build_resource_attributes(&raw).unwrap();
        assert_eq!(resource.id, "7");
        assert_eq!(resource.owner_id.as_deref(), Some("u2"));
    }

    #[test]
    fn test_unused_aliases_stay_in_extra() {
        let raw = json!({
            "id": "d1",
            "ownerId": "u2",
            "createdById": "u1",
            "organizationId": "o1",
            "organization_id": "o2",
            "status": 3
        });
        let resource = build_resource_attributes(&raw).unwrap();

        assert_eq!(resource.owner_id.as_deref(), Some("u2"));
        assert_eq!(resource.organization_id.as_deref(), Some("o1"));
        assert!(resource.status.is_none());
        assert_eq!(resource.extra("createdById"), Some(&AttributeValue::from("u1")));
        assert_eq!(resource.extra("organization_id"), Some(&AttributeValue::from("o2")));
        assert_eq!(resource.extra("status"), Some(&AttributeValue::Integer(3)));
        assert!(resource.extra("ownerId").is_none());
        assert!(resource.extra("organizationId").is_none());

        let subject = SubjectAttributes::new("u1", PrincipalType::Employee);
        assert_eq!(
            Rule::subject_matches("createdById").evaluate(&subject, Some(&resource), None),
            Ok(true)
        );
    }

    #[test]
    fn test_resource_without_id_is_invalid() {
        for raw in [json!({"status": "DRAFT"}), json!({"id": null}), json!({"id": ""}), json!("sup1")] {
            assert!(
                matches!(build_resource_attributes(&raw), Err(AbacError::InvalidResource { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_context_defaults_and_overrides() {
        let now = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
        let defaulted = build_context_attributes_at(None, now);
        assert_eq!(defaulted.time_of_day, now);
        assert!(defaulted.request_ip.is_none());

        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let merged = build_context_attributes_at(
            Some(PartialContext {
                time_of_day: Some(earlier),
                request_ip: Some("10.0.0.1".to_string()),
                client_type: Some("web".to_string()),
                ..PartialContext::default()
            }),
            now,
        );
        assert_eq!(merged.time_of_day, earlier);
        assert_eq!(merged.request_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(merged.client_type.as_deref(), Some("web"));
    }

    #[test]
    fn test_context_uses_clock() {
        let before = Utc::now();
        let context = build_context_attributes(None);
        assert!(context.time_of_day >= before);
    }
}
