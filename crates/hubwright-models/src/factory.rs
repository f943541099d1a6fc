//! Adapter factory.
//!
//! Owns one shared HTTP client, per-provider base URL overrides, the
//! Replicate poll policy and a cancellation token handed to every
//! poll-based adapter it creates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hubwright_abstraction::{ProviderAdapter, ProviderError, ProviderKind};
use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::anthropic::AnthropicAdapter;
use crate::cohere::CohereAdapter;
use crate::huggingface::HuggingFaceAdapter;
use crate::local::LocalAdapter;
use crate::openai::OpenAiAdapter;
use crate::replicate::{PollPolicy, ReplicateAdapter};
use crate::transport::{AuthScheme, HttpTransport, default_base_url};

/// Errors constructing the factory itself.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Factory settings.
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Per-provider endpoint overrides.
    pub base_urls: HashMap<ProviderKind, String>,
    /// Timeout for each individual HTTP request.
    pub request_timeout: Duration,
    /// Polling bounds for submit-then-poll providers.
    pub poll: PollPolicy,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            base_urls: HashMap::new(),
            request_timeout: Duration::from_secs(60),
            poll: PollPolicy::default(),
        }
    }
}

impl FactoryConfig {
    #[must_use]
    pub fn with_base_url(mut self, provider: ProviderKind, url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, url.into());
        self
    }

    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn base_url(&self, provider: ProviderKind) -> &str {
        self.base_urls.get(&provider).map_or_else(|| default_base_url(provider), String::as_str)
    }
}

/// Builds adapters for resolved models.
#[derive(Debug, Clone)]
pub struct ProviderFactory {
    config: FactoryConfig,
    client: Client,
    cancel: CancellationToken,
}

impl ProviderFactory {
    pub fn new(config: FactoryConfig) -> Result<Self, FactoryError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client, cancel: CancellationToken::new() })
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Token observed by every poll loop this factory starts.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops all in-flight polling.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Creates an adapter for `model_id` on `provider`.
    ///
    /// # Errors
    /// Returns a configuration error when a remote provider has no secret.
    pub fn create(
        &self,
        provider: ProviderKind,
        model_id: &str,
        secret: Option<&str>,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let secret = match (provider.requires_secret(), secret) {
            (true, None) => {
                return Err(ProviderError::configuration(
                    provider,
                    format!("no credential configured for {}", provider),
                ));
            }
            (_, secret) => secret.unwrap_or_default().to_string(),
        };

        debug!(provider = %provider, model_id = %model_id, "Creating provider adapter");

        let transport = HttpTransport::new(
            provider,
            self.config.base_url(provider),
            AuthScheme::for_provider(provider, secret),
            self.client.clone(),
        );

        let adapter: Arc<dyn ProviderAdapter> = match provider {
            ProviderKind::OpenAi | ProviderKind::Perplexity => {
                Arc::new(OpenAiAdapter::new(model_id, transport))
            }
            ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(model_id, transport)),
            ProviderKind::HuggingFace => Arc::new(HuggingFaceAdapter::new(model_id, transport)),
            ProviderKind::Replicate => Arc::new(
                ReplicateAdapter::new(model_id, transport)
                    .with_poll_policy(self.config.poll)
                    .with_cancellation(self.cancel.child_token()),
            ),
            ProviderKind::Cohere => Arc::new(CohereAdapter::new(model_id, transport)),
            ProviderKind::Local => Arc::new(LocalAdapter::new(model_id, transport)),
        };
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubwright_abstraction::{ProviderErrorKind, TurnFormat};

    fn factory() -> ProviderFactory {
        ProviderFactory::new(FactoryConfig::default()).unwrap()
    }

    #[test]
    fn test_remote_provider_without_secret_is_configuration_error() {
        let err = factory().create(ProviderKind::OpenAi, "gpt-4o", None).err().unwrap();
        assert_eq!(err.kind, ProviderErrorKind::Configuration);
        assert_eq!(err.provider, ProviderKind::OpenAi);
    }

    #[test]
    fn test_local_provider_needs_no_secret() {
        let adapter = factory().create(ProviderKind::Local, "tiny", None).unwrap();
        assert_eq!(adapter.provider(), ProviderKind::Local);
        assert_eq!(adapter.turn_format(), TurnFormat::ChatMarkup);
    }

    #[test]
    fn test_each_provider_declares_its_turn_format() {
        let factory = factory();
        let expected = [
            (ProviderKind::OpenAi, TurnFormat::RoleTagged),
            (ProviderKind::Perplexity, TurnFormat::RoleTagged),
            (ProviderKind::Anthropic, TurnFormat::SystemField),
            (ProviderKind::HuggingFace, TurnFormat::PlainJoin),
            (ProviderKind::Replicate, TurnFormat::XmlTagged),
            (ProviderKind::Cohere, TurnFormat::LastUserTurn),
        ];
        for (provider, format) in expected {
            let adapter = factory.create(provider, "m", Some("secret")).unwrap();
            assert_eq!(adapter.provider(), provider);
            assert_eq!(adapter.turn_format(), format, "{}", provider);
        }
    }

    #[test]
    fn test_base_url_override() {
        let config =
            FactoryConfig::default().with_base_url(ProviderKind::Cohere, "http://127.0.0.1:9");
        assert_eq!(config.base_url(ProviderKind::Cohere), "http://127.0.0.1:9");
        assert_eq!(config.base_url(ProviderKind::OpenAi), "https://api.openai.com/v1");
    }
}
