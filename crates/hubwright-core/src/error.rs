//! Error types for the bot core.

use hubwright_abstraction::ProviderError;
use hubwright_models::FactoryError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::permissions::PermissionError;
use crate::preferences::PreferenceError;
use crate::scm::ScmError;
use crate::workflow::WorkflowError;

/// Malformed structured user input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no preferences given")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("malformed pair '{0}', expected key=value")]
    Pair(String),

    /// Command arguments that do not fit the command's syntax.
    #[error("usage: {0}")]
    Usage(String),
}

/// Core error type for bot operations.
#[derive(Error, Debug)]
pub enum BotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Provider setup error: {0}")]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    SourceControl(#[from] ScmError),

    #[error("Preference error: {0}")]
    Preference(#[from] PreferenceError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;
