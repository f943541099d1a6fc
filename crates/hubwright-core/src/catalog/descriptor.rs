//! Model descriptors and capability tags.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use hubwright_abstraction::ProviderKind;
use serde::{Deserialize, Serialize};

/// A skill a model is assumed to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Code,
    Reasoning,
    Summarization,
    Security,
    Research,
    Chat,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Reasoning => "reasoning",
            Self::Summarization => "summarization",
            Self::Security => "security",
            Self::Research => "research",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "reasoning" => Ok(Self::Reasoning),
            "summarization" | "summarisation" => Ok(Self::Summarization),
            "security" => Ok(Self::Security),
            "research" => Ok(Self::Research),
            "chat" => Ok(Self::Chat),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Builds a capability set from a slice.
pub fn capabilities(caps: &[Capability]) -> BTreeSet<Capability> {
    caps.iter().copied().collect()
}

/// Everything the selector knows about one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Catalog name, e.g. `gpt-4o` or a local directory name.
    pub name: String,
    pub provider: ProviderKind,
    pub capabilities: BTreeSet<Capability>,
    /// Maximum tokens accepted per request.
    pub context_window: u32,
    /// Relative quality score in `[0, 1]`.
    pub performance: f64,
    /// Served from a local artifact rather than a remote API.
    #[serde(default)]
    pub local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    /// Provider-side identifier when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_model: Option<String>,
}

impl ModelDescriptor {
    pub fn remote(
        name: impl Into<String>,
        provider: ProviderKind,
        caps: &[Capability],
        context_window: u32,
        performance: f64,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            capabilities: capabilities(caps),
            context_window,
            performance,
            local: false,
            artifact_path: None,
            api_model: None,
        }
    }

    pub fn local(
        name: impl Into<String>,
        caps: &[Capability],
        context_window: u32,
        performance: f64,
        artifact_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: ProviderKind::Local,
            capabilities: capabilities(caps),
            context_window,
            performance,
            local: true,
            artifact_path: Some(artifact_path.into()),
            api_model: None,
        }
    }

    #[must_use]
    pub fn with_api_model(mut self, api_model: impl Into<String>) -> Self {
        self.api_model = Some(api_model.into());
        self
    }

    /// Identifier sent to the provider.
    pub fn provider_model_id(&self) -> &str {
        self.api_model.as_deref().unwrap_or(&self.name)
    }

    /// Whether this model covers every capability in `required`.
    pub fn covers(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }

    /// Checks the invariants a registered descriptor must hold.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }
        if self.capabilities.is_empty() {
            return Err("no known capabilities".to_string());
        }
        if self.context_window == 0 {
            return Err("context window must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.performance) {
            return Err(format!("performance {} outside [0, 1]", self.performance));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_is_superset_check() {
        let model = ModelDescriptor::remote(
            "m",
            ProviderKind::OpenAi,
            &[Capability::Code, Capability::Reasoning],
            1000,
            0.5,
        );
        assert!(model.covers(&capabilities(&[Capability::Code])));
        assert!(model.covers(&BTreeSet::new()));
        assert!(!model.covers(&capabilities(&[Capability::Code, Capability::Security])));
    }

    #[test]
    fn test_validate() {
        let ok = ModelDescriptor::local("tiny", &[Capability::Chat], 2048, 0.4, "/models/tiny");
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.performance = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = ok.clone();
        bad.capabilities.clear();
        assert!(bad.validate().is_err());

        let mut bad = ok;
        bad.context_window = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_provider_model_id() {
        let model = ModelDescriptor::remote("claude-3-opus", ProviderKind::Anthropic, &[], 1, 0.1)
            .with_api_model("claude-3-opus-20240229");
        assert_eq!(model.provider_model_id(), "claude-3-opus-20240229");
    }

    #[test]
    fn test_capability_parse() {
        assert_eq!("Summarisation".parse::<Capability>().unwrap(), Capability::Summarization);
        assert!("telepathy".parse::<Capability>().is_err());
    }
}
