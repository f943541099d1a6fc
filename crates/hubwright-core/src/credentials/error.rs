//! Error types for credential operations.

use thiserror::Error;

/// Credential-store errors.
///
/// These surface from loading and persisting the vault. Reading a secret
/// never fails; a missing or undecryptable entry is simply absent.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Vault (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The vault file exists but cannot be used.
    #[error("Vault corrupted: {0}")]
    VaultCorruption(String),

    /// The vault was written by an incompatible format version.
    #[error("Invalid vault version: expected {expected}, found {found}")]
    InvalidVaultVersion { expected: String, found: String },

    /// Encryption failed.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// The store path has no parent directory.
    #[error("Invalid store path: {0}")]
    InvalidPath(String),
}

/// Result type alias for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Why a discovery lookup produced nothing. Logged, never returned.
#[derive(Error, Debug)]
pub(crate) enum DiscoveryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no secret found in {0}")]
    NoSecret(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CredentialError::InvalidVaultVersion {
            expected: "1.0".to_string(),
            found: "0.9".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid vault version: expected 1.0, found 0.9");

        let err = DiscoveryError::NoSecret("~/.openai".to_string());
        assert_eq!(err.to_string(), "no secret found in ~/.openai");
    }
}
