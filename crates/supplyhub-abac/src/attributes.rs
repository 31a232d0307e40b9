//! Attribute types for ABAC evaluation.
//!
//! Three attribute bundles drive access decisions:
//! - **Subject attributes**: Principal id and type, roles, organization, org units
//! - **Resource attributes**: Resource id, organization, owner, lifecycle status
//! - **Context attributes**: Evaluation time, request origin, client type
//!
//! Each bundle carries an `extra` map of flat scalar values for
//! resource-type-specific fields and custom claims.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AbacError;

// ============================================================================
// Attribute Value
// ============================================================================

/// A scalar attribute value.
///
/// Nested values are never stored, which keeps bundles flat and cheap to
/// compare and log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl AttributeValue {
    /// Converts a JSON value, returning `None` for arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Returns the string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as an identifier: strings as-is, integers in decimal.
    ///
    /// Ids arrive as either strings or integers depending on the table.
    pub fn as_identifier(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(_) | Self::Boolean(_) | Self::Null => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Flat map of extra attributes.
pub type ExtraAttributes = BTreeMap<String, AttributeValue>;

// ============================================================================
// Action
// ============================================================================

/// An operation subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    Approve,
    Reject,
    Assign,
    Transfer,
    Verify,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Action; 9] = [
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Approve,
        Action::Reject,
        Action::Assign,
        Action::Transfer,
        Action::Verify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Assign => "assign",
            Action::Transfer => "transfer",
            Action::Verify => "verify",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AbacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AbacError::UnknownAction(s.to_string()))
    }
}

// ============================================================================
// Principal Type
// ============================================================================

/// The category of principal making a request.
///
/// Every principal implicitly holds the role named after its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    /// Staff member of a buying organization.
    Employee,
    /// Supplier account.
    Supplier,
    /// Login scoped to one supplier site.
    SupplierSite,
    /// Platform administrator.
    Admin,
}

impl PrincipalType {
    /// The role name implied by this principal type.
    pub fn role_name(self) -> &'static str {
        match self {
            PrincipalType::Employee => "EMPLOYEE",
            PrincipalType::Supplier => "SUPPLIER",
            PrincipalType::SupplierSite => "SUPPLIER_SITE",
            PrincipalType::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role_name())
    }
}

// ============================================================================
// Subject Attributes
// ============================================================================

/// Attributes describing the principal making the request.
///
/// Built fresh per request by the extraction helpers.
///
/// `new`, extraction and deserialization all seed `roles` with the principal
/// type's role. Code that assigns `roles` directly owns that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SubjectRecord")]
pub struct SubjectAttributes {
    /// Opaque principal identifier.
    pub id: String,
    /// Principal category.
    pub principal_type: PrincipalType,
    /// Role names and codes held by the principal.
    pub roles: BTreeSet<String>,
    /// Tenant the principal belongs to, if any.
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Employee code (employees only).
    #[serde(default)]
    pub employee_code: Option<String>,
    /// Org units the employee is assigned to (employees only).
    #[serde(default)]
    pub org_unit_ids: BTreeSet<String>,
    /// Custom claims.
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl SubjectAttributes {
    /// Creates a subject holding only its principal type's role.
    pub fn new(id: impl Into<String>, principal_type: PrincipalType) -> Self {
        Self {
            id: id.into(),
            principal_type,
            roles: BTreeSet::from([principal_type.role_name().to_string()]),
            organization_id: None,
            employee_code: None,
            org_unit_ids: BTreeSet::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Sets the organization ID.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Adds a custom claim.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Wire form of [`SubjectAttributes`]; `roles` may omit the principal role.
#[derive(Deserialize)]
struct SubjectRecord {
    id: String,
    principal_type: PrincipalType,
    #[serde(default)]
    roles: BTreeSet<String>,
    #[serde(default)]
    organization_id: Option<String>,
    #[serde(default)]
    employee_code: Option<String>,
    #[serde(default)]
    org_unit_ids: BTreeSet<String>,
    #[serde(default)]
    extra: ExtraAttributes,
}

impl From<SubjectRecord> for SubjectAttributes {
    fn from(record: SubjectRecord) -> Self {
        let mut subject = Self::new(record.id, record.principal_type);
        subject.roles.extend(record.roles);
        subject.organization_id = record.organization_id;
        subject.employee_code = record.employee_code;
        subject.org_unit_ids = record.org_unit_ids;
        subject.extra = record.extra;
        subject
    }
}

// ============================================================================
// Resource Attributes
// ============================================================================

/// Attributes describing the resource being acted upon.
///
/// A read-only snapshot; the evaluator never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    /// Identifier of the resource instance.
    pub id: String,
    /// Tenant that owns the resource.
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Principal that created or owns the resource.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Lifecycle state, e.g. `DRAFT`, `PENDING_APPROVAL`, `ACTIVE`.
    #[serde(default)]
    pub status: Option<String>,
    /// Resource-type-specific scalar fields (`supplierId`, `requestedById`, ...).
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl ResourceAttributes {
    /// Creates resource attributes carrying only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            organization_id: None,
            owner_id: None,
            status: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the organization ID.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Sets the owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Sets the lifecycle status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Adds an extra attribute.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&AttributeValue> {
        self.extra.get(key)
    }
}

// ============================================================================
// Context Attributes
// ============================================================================

/// Attributes describing the environment of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextAttributes {
    /// When the evaluation happens.
    pub time_of_day: DateTime<Utc>,
    /// IP address of the request origin (String to avoid `IpAddr` serde issues).
    #[serde(default)]
    pub request_ip: Option<String>,
    /// Kind of client, e.g. `web`, `mobile`, `integration`.
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default)]
    pub extra: ExtraAttributes,
}

impl ContextAttributes {
    /// Creates a context for the given time with no other fields.
    pub fn at(time_of_day: DateTime<Utc>) -> Self {
        Self {
            time_of_day,
            request_ip: None,
            client_type: None,
            extra: BTreeMap::new(),
        }
    }

    /// Whether `time_of_day` falls within business hours.
    ///
    /// Business hours are 09:00-17:00 UTC on weekdays (Mon-Fri).
    pub fn is_business_hours(&self) -> bool {
        let ts = self.time_of_day;
        let is_weekday = !matches!(ts.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun);
        is_weekday && (9..17).contains(&ts.hour())
    }
}

/// Caller-supplied context fields, merged over the defaults by
/// [`build_context_attributes`](crate::extraction::build_context_attributes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialContext {
    #[serde(default)]
    pub time_of_day: Option<DateTime<Utc>>,
    #[serde(default)]
    pub request_ip: Option<String>,
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default)]
    pub extra: ExtraAttributes,
}

// ============================================================================
// Tests
// ============================================================================
