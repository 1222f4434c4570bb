//! CLI error type.

use std::fmt;

use assetsync::{ConfigError, ManagerError};

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration is missing or invalid.
    Config(String),
    /// The assets manager could not be created or a maintenance call failed.
    Manager(ManagerError),
    /// The update did not complete.
    Update(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Manager(e) => write!(f, "{}", e),
            CliError::Update(msg) => write!(f, "Update failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Manager(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}
