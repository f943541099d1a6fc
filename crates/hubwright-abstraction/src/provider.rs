//! Provider identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of completion backends the bot can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// Hugging Face hosted inference.
    #[serde(rename = "huggingface")]
    HuggingFace,
    /// Replicate predictions (submit, then poll).
    Replicate,
    /// Cohere generate API.
    Cohere,
    /// Perplexity, OpenAI-compatible chat completions.
    Perplexity,
    /// A locally hosted runtime serving on-disk model artifacts.
    Local,
}

impl ProviderKind {
    /// Returns the canonical lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::HuggingFace => "huggingface",
            Self::Replicate => "replicate",
            Self::Cohere => "cohere",
            Self::Perplexity => "perplexity",
            Self::Local => "local",
        }
    }

    /// Every provider, in declaration order.
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::OpenAi,
            Self::Anthropic,
            Self::HuggingFace,
            Self::Replicate,
            Self::Cohere,
            Self::Perplexity,
            Self::Local,
        ]
    }

    /// Remote providers that need a secret before a call can be made.
    pub fn remote() -> impl Iterator<Item = ProviderKind> {
        Self::all().iter().copied().filter(ProviderKind::requires_secret)
    }

    /// Whether calls to this provider need a credential.
    pub fn requires_secret(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider: {0}")]
pub struct ParseProviderError(pub String);

impl FromStr for ProviderKind {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "replicate" => Ok(Self::Replicate),
            "cohere" => Ok(Self::Cohere),
            "perplexity" => Ok(Self::Perplexity),
            "local" => Ok(Self::Local),
            other => Err(ParseProviderError(other.to_string())),
        }
    }
}
