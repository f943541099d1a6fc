//! The normalized provider failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProviderKind;

/// What went wrong talking to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderErrorKind {
    /// Connection, TLS or request-level failure.
    Transport,
    /// Non-success HTTP status.
    Status(u16),
    /// The response body did not have the expected shape.
    Decode,
    /// An asynchronous job reached a failed terminal state.
    Failed,
    /// Polling exhausted its attempt budget.
    Timeout,
    /// The shared cancellation signal fired.
    Cancelled,
    /// The adapter could not be built (bad URL, missing secret).
    Configuration,
}

/// Any failure from a provider call, wrapped into one shape.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{provider} API error: {message}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self { provider, kind, message: message.into() }
    }

    pub fn transport(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Transport, message)
    }

    pub fn status(provider: ProviderKind, status: u16, body: impl AsRef<str>) -> Self {
        let body = body.as_ref();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        Self::new(provider, ProviderErrorKind::Status(status), message)
    }

    pub fn decode(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Decode, message)
    }

    pub fn configuration(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Configuration, message)
    }

    /// Whether a retry with the same input might succeed.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ProviderErrorKind::Transport | ProviderErrorKind::Timeout => true,
            ProviderErrorKind::Status(code) => code == 429 || code >= 500,
            _ => false,
        }
    }
}
