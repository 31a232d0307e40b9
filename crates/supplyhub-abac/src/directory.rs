//! Role-assignment lookups.
//!
//! Subject extraction asks a [`RoleDirectory`] for the employee record and
//! the org-unit role assignments behind an employee principal. Production
//! implementations sit on the application database; [`InMemoryDirectory`]
//! serves tests and the CLI.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// Employee record associated with an employee principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: String,
    #[serde(default)]
    pub employee_code: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// One org-unit role held by an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub org_unit_id: String,
    /// Role display name, e.g. `APPROVER`.
    pub role_name: String,
    /// Short role code, e.g. `APR`.
    #[serde(default)]
    pub role_code: Option<String>,
}

/// Read-only access to employee records and role assignments.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Finds the employee record behind a principal id.
    async fn find_employee(
        &self,
        principal_id: &str,
    ) -> Result<Option<EmployeeRecord>, DirectoryError>;

    /// Lists the org-unit role assignments of an employee.
    async fn role_assignments(
        &self,
        employee_id: &str,
    ) -> Result<Vec<RoleAssignment>, DirectoryError>;
}

/// Directory backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    employees: BTreeMap<String, EmployeeRecord>,
    assignments: BTreeMap<String, Vec<RoleAssignment>>,
    unavailable: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the employee record for a principal (builder pattern).
    pub fn with_employee(
        mut self,
        principal_id: impl Into<String>,
        record: EmployeeRecord,
    ) -> Self {
        self.employees.insert(principal_id.into(), record);
        self
    }

    /// Adds a role assignment for an employee (builder pattern).
    pub fn with_assignment(
        mut self,
        employee_id: impl Into<String>,
        assignment: RoleAssignment,
    ) -> Self {
        self.assignments
            .entry(employee_id.into())
            .or_default()
            .push(assignment);
        self
    }

    /// Makes every lookup fail with [`DirectoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DirectoryError::Unavailable("in-memory directory disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RoleDirectory for InMemoryDirectory {
    async fn find_employee(
        &self,
        principal_id: &str,
    ) -> Result<Option<EmployeeRecord>, DirectoryError> {
        self.check_available()?;
        Ok(self.employees.get(principal_id).cloned())
    }

    async fn role_assignments(
        &self,
        employee_id: &str,
    ) -> Result<Vec<RoleAssignment>, DirectoryError> {
        self.check_available()?;
        Ok(self.assignments.get(employee_id).cloned().unwrap_or_default())
    }
}
