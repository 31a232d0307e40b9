//! Supplyhub authorization CLI.
//!
//! Operator tool for inspecting and testing the access-control policies of
//! the supplier-management platform.
//!
//! # Quick Start
//!
//! ```bash
//! # Print the effective policy set as a table
//! supplyhub-authz policy show --format table
//!
//! # Check whether a principal may update a supplier record
//! supplyhub-authz check --resource-type supplier --action update \
//!     --subject subject.json --resource supplier.json
//!
//! # Validate a policy document before deploying it
//! supplyhub-authz policy validate policies.toml
//! ```

mod commands;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use supplyhub_config::{ConfigLoader, SupplyhubConfig};
use tracing_subscriber::EnvFilter;

/// Supplyhub authorization - inspect and test access-control policies.
#[derive(Parser)]
#[command(name = "supplyhub-authz")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding supplyhub.toml.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one access request. Exits 0 when granted, 2 when denied.
    Check {
        /// Resource type, e.g. supplier or approval_request.
        #[arg(short = 't', long)]
        resource_type: String,

        /// Action: view, create, update, delete, approve, reject, assign, transfer or verify.
        #[arg(short, long)]
        action: String,

        /// JSON file describing the principal.
        #[arg(short, long)]
        subject: PathBuf,

        /// JSON file with the resource record.
        #[arg(short, long)]
        resource: Option<PathBuf>,

        /// JSON file with request context fields.
        #[arg(short, long)]
        context: Option<PathBuf>,
    },

    /// Policy commands.
    #[command(subcommand)]
    Policy(PolicyCommands),

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Show the effective policy configuration.
    Show {
        /// Output format (json, toml, table).
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Validate a policy document (JSON or TOML).
    Validate {
        /// Policy file.
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color || std::env::var_os("NO_COLOR").is_some());

    // Logging is configured before the config error surfaces, so the
    // filter falls back to the default when loading fails.
    let loaded = ConfigLoader::new().with_project_dir(&cli.project).load();
    let filter = loaded
        .as_ref()
        .map_or_else(|_| SupplyhubConfig::default().logging.filter, |c| c.logging.filter.clone());
    init_logging(&filter);
    let config = loaded?;

    match cli.command {
        Commands::Check {
            resource_type,
            action,
            subject,
            resource,
            context,
        } => {
            let granted = commands::check::run(
                &config,
                &resource_type,
                &action,
                &subject,
                resource.as_deref(),
                context.as_deref(),
            )
            .await?;
            Ok(if granted {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(commands::check::DENIED_EXIT_CODE)
            })
        }
        Commands::Policy(cmd) => {
            match cmd {
                PolicyCommands::Show { format } => commands::policy::show(&config, &format)?,
                PolicyCommands::Validate { file } => commands::policy::validate(&file)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(ConfigCommands::Show { format }) => {
            commands::config::show(&config, &format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(!style::no_color())
        .init();
}
