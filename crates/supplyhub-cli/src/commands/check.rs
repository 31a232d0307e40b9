//! Access check command.
//!
//! The subject file describes the caller and, for employees, the directory
//! entries behind it:
//!
//! ```json
//! {
//!   "principal": {"id": "u1", "principalType": "EMPLOYEE", "attributes": {}},
//!   "employee": {"id": "e1", "employeeCode": "EMP-001", "organizationId": "org-a"},
//!   "assignments": [{"orgUnitId": "ou-1", "roleName": "APPROVER"}],
//!   "roles": []
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use supplyhub_abac::{
    AbacError, Action, AttributeExtractor, EmployeeRecord, InMemoryDirectory, PartialContext,
    PolicyEnforcer, PolicyEvaluator, PrincipalRecord, RoleAssignment, build_context_attributes,
    build_resource_attributes,
};
use supplyhub_config::SupplyhubConfig;

/// Process exit code for a denied request.
pub const DENIED_EXIT_CODE: u8 = 2;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectFile {
    principal: PrincipalRecord,
    #[serde(default)]
    employee: Option<EmployeeRecord>,
    #[serde(default)]
    assignments: Vec<RoleAssignment>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionOutput {
    granted: bool,
    resource_type: String,
    action: Action,
    subject: String,
    roles: Vec<String>,
    matched_role: Option<String>,
    reason: Option<String>,
}

/// Evaluates one request and prints the decision as JSON.
///
/// Returns whether access was granted.
pub async fn run(
    config: &SupplyhubConfig,
    resource_type: &str,
    action: &str,
    subject_file: &Path,
    resource_file: Option<&Path>,
    context_file: Option<&Path>,
) -> Result<bool> {
    let action: Action = action.parse()?;
    let subject_input: SubjectFile = read_json(subject_file)?;

    let mut directory = InMemoryDirectory::new();
    if let Some(employee) = &subject_input.employee {
        directory = directory.with_employee(&subject_input.principal.id, employee.clone());
        for assignment in subject_input.assignments {
            directory = directory.with_assignment(&employee.id, assignment);
        }
    }

    let extractor =
        AttributeExtractor::new(directory).with_failure_mode(config.enrichment.failure_mode);
    let subject = extractor
        .build_subject_attributes(
            &subject_input.principal,
            None,
            Some(subject_input.roles.as_slice()),
        )
        .await?;

    let resource = match resource_file {
        Some(path) => Some(build_resource_attributes(&read_json::<serde_json::Value>(
            path,
        )?)?),
        None => None,
    };
    let context = build_context_attributes(
        context_file
            .map(read_json::<PartialContext>)
            .transpose()?,
    );

    let policies = config
        .load_policy()
        .context("Failed to load policy configuration")?;
    let mut enforcer = PolicyEnforcer::new(Arc::new(PolicyEvaluator::new(policies)));
    if !config.enforcement.audit {
        enforcer = enforcer.without_audit();
    }

    let outcome = enforcer.authorize(
        resource_type,
        action,
        &subject,
        resource.as_ref(),
        Some(&context),
    );

    let output = match outcome {
        Ok(result) => DecisionOutput {
            granted: true,
            resource_type: resource_type.to_string(),
            action,
            subject: subject.id.clone(),
            roles: subject.roles.iter().cloned().collect(),
            matched_role: result.matched_role,
            reason: result.reason,
        },
        Err(AbacError::AccessDenied { reason, .. }) => DecisionOutput {
            granted: false,
            resource_type: resource_type.to_string(),
            action,
            subject: subject.id.clone(),
            roles: subject.roles.iter().cloned().collect(),
            matched_role: None,
            reason: Some(reason),
        },
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(output.granted)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
