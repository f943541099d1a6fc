//! Shared HTTP plumbing for remote adapters.
//!
//! Every adapter sends JSON and receives JSON; this module owns the auth
//! header shapes and the mapping of every reqwest/status/decode failure into
//! a [`ProviderError`].

use hubwright_abstraction::{ProviderError, ProviderKind};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

/// Authorization header shape.
#[derive(Clone)]
pub enum AuthScheme {
    /// `Authorization: Bearer <secret>`
    Bearer(String),
    /// `Authorization: Token <secret>`
    Token(String),
    /// Secret in a named header, e.g. `x-api-key`.
    Header { name: &'static str, value: String },
    /// No authorization.
    None,
}

impl AuthScheme {
    /// The header shape a provider expects for its secret.
    pub fn for_provider(provider: ProviderKind, secret: String) -> Self {
        match provider {
            ProviderKind::Anthropic => Self::Header { name: "x-api-key", value: secret },
            ProviderKind::Replicate => Self::Token(secret),
            ProviderKind::Local => Self::None,
            ProviderKind::OpenAi
            | ProviderKind::HuggingFace
            | ProviderKind::Cohere
            | ProviderKind::Perplexity => Self::Bearer(secret),
        }
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer(secret) => builder.bearer_auth(secret),
            Self::Token(secret) => builder.header("Authorization", format!("Token {}", secret)),
            Self::Header { name, value } => builder.header(*name, value),
            Self::None => builder,
        }
    }
}

impl std::fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Self::Bearer(_) => "Bearer",
            Self::Token(_) => "Token",
            Self::Header { name, .. } => *name,
            Self::None => "None",
        };
        f.debug_tuple("AuthScheme").field(&shape).finish()
    }
}

/// Public endpoint for each provider.
pub fn default_base_url(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "https://api.openai.com/v1",
        ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        ProviderKind::HuggingFace => "https://api-inference.huggingface.co/models",
        ProviderKind::Replicate => "https://api.replicate.com/v1",
        ProviderKind::Cohere => "https://api.cohere.ai/v1",
        ProviderKind::Perplexity => "https://api.perplexity.ai",
        ProviderKind::Local => "http://localhost:11434",
    }
}

/// A base URL, an auth scheme and a client, bound to one provider.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    provider: ProviderKind,
    base_url: String,
    auth: AuthScheme,
    headers: Vec<(&'static str, String)>,
    client: Client,
}

impl HttpTransport {
    pub fn new(
        provider: ProviderKind,
        base_url: impl Into<String>,
        auth: AuthScheme,
        client: Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { provider, base_url, auth, headers: Vec::new(), client }
    }

    /// A transport against the provider's public endpoint with a default client.
    pub fn for_provider(provider: ProviderKind, secret: impl Into<String>) -> Self {
        Self::new(
            provider,
            default_base_url(provider),
            AuthScheme::for_provider(provider, secret.into()),
            Client::new(),
        )
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POSTs a JSON body and decodes a JSON response.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(provider = %self.provider, url = %url, "POST");
        self.send(self.client.post(&url).json(body)).await
    }

    /// GETs and decodes a JSON response.
    pub async fn get_json<R>(&self, path: &str) -> Result<R, ProviderError>
    where
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(provider = %self.provider, url = %url, "GET");
        self.send(self.client.get(&url)).await
    }

    async fn send<R>(&self, builder: RequestBuilder) -> Result<R, ProviderError>
    where
        R: DeserializeOwned,
    {
        let mut builder = self.auth.apply(builder);
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await.map_err(|e| {
            error!(provider = %self.provider, error = %e, "Request failed");
            ProviderError::transport(self.provider, format!("Network error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = %self.provider, status = %status, "Provider returned error status");
            return Err(ProviderError::status(self.provider, status.as_u16(), body.trim()));
        }

        response.json::<R>().await.map_err(|e| {
            error!(provider = %self.provider, error = %e, "Failed to parse response");
            ProviderError::decode(self.provider, format!("Failed to parse response: {}", e))
        })
    }
}
