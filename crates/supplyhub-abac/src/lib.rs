//! # supplyhub-abac: Attribute-Based Access Control for Supplyhub
//!
//! Decides whether a principal may perform an action on a supplier-management
//! resource, based on the principal's roles and attributes, the resource's
//! attributes and the request context. Every tenant-scoped rule keeps
//! principals inside their own organization.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Request Handler                             │
//! │  (Principal + Resource record + Context)     │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Attribute Extraction                        │
//! │  ├─ Subject (roles, org, org units)          │
//! │  │   └─ RoleDirectory lookups (fail-soft)    │
//! │  ├─ Resource (id, org, owner, status)        │
//! │  └─ Context (time, ip, client)               │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Policy Evaluator                            │
//! │  ├─ Resource policy lookup                   │
//! │  ├─ Per-role permission (constant or rule)   │
//! │  └─ First granting role wins                 │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AccessControlResult                         │
//! │  - granted                                   │
//! │  - matched role                              │
//! │  - reason (logs only)                        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Built-in Policies
//!
//! [`defaults::default_policy_config`] covers `supplier`, `supplier_site`,
//! `approval_request`, `document` and `organization`. `ADMIN` may do
//! anything; every other role is scoped by organization, ownership and
//! lifecycle status.
//!
//! ## Examples
//!
//! ```
//! use supplyhub_abac::{Action, PolicyEvaluator, PrincipalType, ResourceAttributes, SubjectAttributes};
//!
//! let evaluator = PolicyEvaluator::default();
//!
//! let employee = SubjectAttributes::new("u1", PrincipalType::Employee).with_organization("org-a");
//! let supplier = ResourceAttributes::new("sup1")
//!     .with_organization("org-a")
//!     .with_owner("u1")
//!     .with_status("DRAFT");
//!
//! let result = evaluator.evaluate("supplier", Action::Update, &employee, Some(&supplier), None);
//! assert!(result.granted);
//!
//! let submitted = supplier.with_status("PENDING_APPROVAL");
//! let result = evaluator.evaluate("supplier", Action::Update, &employee, Some(&submitted), None);
//! assert!(!result.granted);
//! ```

pub mod attributes;
pub mod defaults;
pub mod directory;
pub mod enforcement;
pub mod error;
pub mod evaluator;
pub mod extraction;
pub mod policy;
pub mod rule;
pub mod store;

pub use attributes::{
    Action, AttributeValue, ContextAttributes, PartialContext, PrincipalType, ResourceAttributes,
    SubjectAttributes,
};
pub use directory::{EmployeeRecord, InMemoryDirectory, RoleAssignment, RoleDirectory};
pub use enforcement::PolicyEnforcer;
pub use error::{AbacError, DirectoryError, PredicateError, Result};
pub use evaluator::{AccessControlResult, PolicyEvaluator, evaluate};
pub use extraction::{
    AttributeExtractor, EnrichmentFailureMode, PrincipalRecord, build_context_attributes,
    build_resource_attributes,
};
pub use policy::{PolicyConfiguration, ResourcePolicy, RolePermissions};
pub use rule::{Permission, Rule};
pub use store::PolicyStore;
