//! Built-in policy set.
//!
//! | Resource type      | ADMIN | EMPLOYEE                          | APPROVER                          | SUPPLIER                      | SUPPLIER_SITE        |
//! |--------------------|-------|-----------------------------------|-----------------------------------|-------------------------------|----------------------|
//! | `supplier`         | all   | view in org, edit own drafts      | approve/reject pending in org     | view/update own live record   | -                    |
//! | `supplier_site`    | all   | view in org, edit own drafts      | approve/reject/assign pending     | manage own sites while live   | view/update own site |
//! | `approval_request` | all   | view in org, edit own drafts      | decide pending in org, not own    | -                             | -                    |
//! | `document`         | all   | view in org, edit own drafts      | verify in org                     | view own, edit/delete own     | view own             |
//! | `organization`     | all   | view own organization             | view own organization             | -                             | -                    |
//!
//! Supplier records in `INACTIVE` or `REJECTED` state are frozen for supplier
//! principals. Transfers are admin-only.

use crate::attributes::Action;
use crate::policy::{PolicyConfiguration, ResourcePolicy, RolePermissions};
use crate::rule::Rule;

/// Resource type names of the built-in policies.
pub mod resource_types {
    pub const SUPPLIER: &str = "supplier";
    pub const SUPPLIER_SITE: &str = "supplier_site";
    pub const APPROVAL_REQUEST: &str = "approval_request";
    pub const DOCUMENT: &str = "document";
    pub const ORGANIZATION: &str = "organization";
}

/// Role names used by the built-in policies.
pub mod roles {
    pub const ADMIN: &str = "ADMIN";
    pub const EMPLOYEE: &str = "EMPLOYEE";
    pub const APPROVER: &str = "APPROVER";
    pub const SUPPLIER: &str = "SUPPLIER";
    pub const SUPPLIER_SITE: &str = "SUPPLIER_SITE";
}

/// Lifecycle states.
pub mod status {
    pub const DRAFT: &str = "DRAFT";
    pub const PENDING_APPROVAL: &str = "PENDING_APPROVAL";
    pub const ACTIVE: &str = "ACTIVE";
    pub const INACTIVE: &str = "INACTIVE";
    pub const REJECTED: &str = "REJECTED";
}

const SUPPLIER_ID: &str = "supplierId";
const REQUESTED_BY_ID: &str = "requestedById";

/// Returns the built-in policy configuration.
pub fn default_policy_config() -> PolicyConfiguration {
    PolicyConfiguration::new()
        .with_policy(supplier_policy())
        .with_policy(supplier_site_policy())
        .with_policy(approval_request_policy())
        .with_policy(document_policy())
        .with_policy(organization_policy())
}

/// Record not yet submitted, still editable by its author.
fn own_draft() -> Rule {
    Rule::All(vec![Rule::IsOwner, Rule::status_in(&[status::DRAFT])])
}

/// Pending decision inside the subject's organization.
fn pending_in_org() -> Rule {
    Rule::All(vec![
        Rule::SameOrganization,
        Rule::status_in(&[status::PENDING_APPROVAL]),
    ])
}

fn not_terminal() -> Rule {
    Rule::status_not_in(&[status::INACTIVE, status::REJECTED])
}

pub fn supplier_policy() -> ResourcePolicy {
    let own_live_record = Rule::All(vec![Rule::IsSelf, not_terminal()]);

    ResourcePolicy::new(resource_types::SUPPLIER)
        .with_role(roles::ADMIN, RolePermissions::allow_all())
        .with_role(
            roles::EMPLOYEE,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Create, true)
                .with(Action::Update, own_draft())
                .with(Action::Delete, own_draft())
                .with(Action::Approve, false)
                .with(Action::Reject, false),
        )
        .with_role(
            roles::APPROVER,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Approve, pending_in_org())
                .with(Action::Reject, pending_in_org()),
        )
        .with_role(
            roles::SUPPLIER,
            RolePermissions::new()
                .with(Action::View, own_live_record.clone())
                .with(Action::Update, own_live_record)
                .with(Action::Create, false)
                .with(Action::Delete, false),
        )
}

pub fn supplier_site_policy() -> ResourcePolicy {
    let own_draft_in_org = Rule::All(vec![Rule::SameOrganization, own_draft()]);
    let own_supplier_live = Rule::All(vec![Rule::subject_matches(SUPPLIER_ID), not_terminal()]);

    ResourcePolicy::new(resource_types::SUPPLIER_SITE)
        .with_role(roles::ADMIN, RolePermissions::allow_all())
        .with_role(
            roles::EMPLOYEE,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Create, Rule::SameOrganization)
                .with(Action::Update, own_draft_in_org.clone())
                .with(Action::Delete, own_draft_in_org),
        )
        .with_role(
            roles::APPROVER,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Approve, pending_in_org())
                .with(Action::Reject, pending_in_org())
                .with(Action::Assign, pending_in_org()),
        )
        .with_role(
            roles::SUPPLIER,
            RolePermissions::new()
                .with(Action::View, Rule::subject_matches(SUPPLIER_ID))
                .with(Action::Create, own_supplier_live.clone())
                .with(Action::Update, own_supplier_live)
                .with(Action::Delete, false),
        )
        .with_role(
            roles::SUPPLIER_SITE,
            RolePermissions::new()
                .with(Action::View, Rule::IsSelf)
                .with(Action::Update, Rule::All(vec![Rule::IsSelf, not_terminal()])),
        )
}

pub fn approval_request_policy() -> ResourcePolicy {
    let own_draft_request = Rule::All(vec![
        Rule::subject_matches(REQUESTED_BY_ID),
        Rule::status_in(&[status::DRAFT]),
    ]);
    // Requesters never decide their own requests.
    let decide = Rule::All(vec![
        pending_in_org(),
        Rule::not(Rule::subject_matches(REQUESTED_BY_ID)),
    ]);

    ResourcePolicy::new(resource_types::APPROVAL_REQUEST)
        .with_role(roles::ADMIN, RolePermissions::allow_all())
        .with_role(
            roles::EMPLOYEE,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Create, true)
                .with(Action::Update, own_draft_request.clone())
                .with(Action::Delete, own_draft_request)
                .with(Action::Approve, false)
                .with(Action::Reject, false),
        )
        .with_role(
            roles::APPROVER,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Approve, decide.clone())
                .with(Action::Reject, decide)
                .with(Action::Assign, pending_in_org()),
        )
}

pub fn document_policy() -> ResourcePolicy {
    let own_supplier_document = Rule::Any(vec![Rule::IsOwner, Rule::subject_matches(SUPPLIER_ID)]);

    ResourcePolicy::new(resource_types::DOCUMENT)
        .with_role(roles::ADMIN, RolePermissions::allow_all())
        .with_role(
            roles::EMPLOYEE,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Create, true)
                .with(Action::Update, own_draft())
                .with(Action::Delete, own_draft())
                .with(Action::Verify, false),
        )
        .with_role(
            roles::APPROVER,
            RolePermissions::new()
                .with(Action::View, Rule::SameOrganization)
                .with(Action::Verify, Rule::SameOrganization),
        )
        .with_role(
            roles::SUPPLIER,
            RolePermissions::new()
                .with(Action::View, own_supplier_document)
                .with(Action::Create, true)
                .with(Action::Update, Rule::IsOwner)
                .with(Action::Delete, Rule::IsOwner)
                .with(Action::Verify, false),
        )
        .with_role(
            roles::SUPPLIER_SITE,
            RolePermissions::new()
                .with(Action::View, Rule::IsOwner)
                .with(Action::Create, true),
        )
}

pub fn organization_policy() -> ResourcePolicy {
    ResourcePolicy::new(resource_types::ORGANIZATION)
        .with_role(roles::ADMIN, RolePermissions::allow_all())
        .with_role(
            roles::EMPLOYEE,
            RolePermissions::new()
                .with(Action::View, Rule::OwnOrganization)
                .with(Action::Create, false)
                .with(Action::Update, false)
                .with(Action::Delete, false),
        )
        .with_role(
            roles::APPROVER,
            RolePermissions::new().with(Action::View, Rule::OwnOrganization),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Permission;

    #[test]
    fn test_default_config_covers_resource_types() {
        let config = default_policy_config();
        assert_eq!(
            config.resource_types().collect::<Vec<_>>(),
            vec![
                resource_types::APPROVAL_REQUEST,
                resource_types::DOCUMENT,
                resource_types::ORGANIZATION,
                resource_types::SUPPLIER,
                resource_types::SUPPLIER_SITE,
            ]
        );
        config.validate().expect("default config is valid");
    }

    #[test]
    fn test_admin_allowed_everything_everywhere() {
        let config = default_policy_config();
        for policy in config.policies() {
            let admin = policy.role(roles::ADMIN).expect("admin table");
            for action in Action::ALL {
                assert_eq!(
                    admin.get(action),
                    Some(&Permission::allow()),
                    "{action} on {}",
                    policy.resource_type
                );
            }
        }
    }

    #[test]
    fn test_transfer_is_admin_only() {
        let config = default_policy_config();
        for policy in config.policies() {
            for (role, table) in &policy.role_permissions {
                if role != roles::ADMIN {
                    assert!(
                        table.get(Action::Transfer).is_none(),
                        "{role} has a transfer entry on {}",
                        policy.resource_type
                    );
                }
            }
        }
    }

    #[test]
    fn test_supplier_delete_denied_for_suppliers() {
        let policy = supplier_policy();
        assert_eq!(
            policy.role(roles::SUPPLIER).and_then(|t| t.get(Action::Delete)),
            Some(&Permission::deny())
        );
    }

    #[test]
    fn test_default_config_json_roundtrip() {
        let config = default_policy_config();
        let json = config.to_json_pretty().expect("serialize");
        let parsed = PolicyConfiguration::from_json_str(&json).expect("parse");
        assert_eq!(parsed, config);
    }
}
