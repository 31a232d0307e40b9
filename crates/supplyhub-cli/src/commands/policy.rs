//! Policy inspection commands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use supplyhub_abac::{Permission, PolicyConfiguration};
use supplyhub_config::SupplyhubConfig;

use crate::style::{print_data_table, print_error, print_success};

/// Show the effective policy configuration.
pub fn show(config: &SupplyhubConfig, format: &str) -> Result<()> {
    let policies = config
        .load_policy()
        .context("Failed to load policy configuration")?;

    match format {
        "json" => println!("{}", policies.to_json_pretty()?),
        "toml" => println!("{}", policies.to_toml_string()?),
        "table" => {
            let rows = policy_rows(&policies)?;
            print_data_table(&["Resource type", "Role", "Action", "Permission"], &rows);
        }
        other => bail!("Unsupported format '{other}' (expected json, toml or table)"),
    }

    Ok(())
}

/// Validate a policy document.
pub fn validate(file: &Path) -> Result<()> {
    match PolicyConfiguration::load_file(file) {
        Ok(policies) => {
            print_success(&format!(
                "Policy is valid: {} resource type(s) in {}",
                policies.len(),
                file.display()
            ));
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Policy validation failed: {e}"));
            Err(e).with_context(|| format!("Invalid policy document {}", file.display()))
        }
    }
}

fn policy_rows(policies: &PolicyConfiguration) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    for policy in policies.policies() {
        for (role, table) in &policy.role_permissions {
            for (action, permission) in table.iter() {
                rows.push(vec![
                    policy.resource_type.clone(),
                    role.clone(),
                    action.to_string(),
                    describe(permission)?,
                ]);
            }
        }
    }
    Ok(rows)
}

fn describe(permission: &Permission) -> Result<String> {
    Ok(match permission {
        Permission::Always(true) => "allow".to_string(),
        Permission::Always(false) => "deny".to_string(),
        Permission::Rule(rule) => serde_json::to_string(rule)?,
    })
}
