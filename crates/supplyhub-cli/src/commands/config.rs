//! Configuration commands.

use anyhow::{Result, bail};
use supplyhub_config::SupplyhubConfig;

use crate::style::{print_header, print_labeled};

/// Show the merged configuration.
pub fn show(config: &SupplyhubConfig, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        "toml" => println!("{}", config.to_toml_string()?),
        "text" => {
            print_header("Policy:");
            print_labeled(
                "File",
                &config
                    .policy
                    .file
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |p| p.display().to_string()),
            );
            print_labeled("Built-in defaults", &config.policy.use_defaults.to_string());
            println!();

            print_header("Enrichment:");
            print_labeled(
                "Failure mode",
                match config.enrichment.failure_mode {
                    supplyhub_abac::EnrichmentFailureMode::FailSoft => "fail-soft",
                    supplyhub_abac::EnrichmentFailureMode::FailClosed => "fail-closed",
                },
            );
            println!();

            print_header("Enforcement:");
            print_labeled("Audit", &config.enforcement.audit.to_string());
            println!();

            print_header("Logging:");
            print_labeled("Filter", &config.logging.filter);
        }
        other => bail!("Unsupported format '{other}' (expected text, json or toml)"),
    }

    Ok(())
}
