//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Policy configuration error: {0}")]
    Policy(#[from] supplyhub_abac::AbacError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("XDG directory error: {0}")]
    XdgError(String),
}
