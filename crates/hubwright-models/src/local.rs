//! Locally hosted models.
//!
//! Talks to an Ollama-compatible runtime (`/api/generate`) on the local host.
//! No authentication is used.

use async_trait::async_trait;
use hubwright_abstraction::{
    CompletionRequest, CompletionResponse, ProviderAdapter, ProviderError, ProviderKind,
    TurnFormat, Usage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::{AuthScheme, HttpTransport, default_base_url};

#[derive(Debug, Clone)]
pub struct LocalAdapter {
    model_id: String,
    transport: HttpTransport,
}

impl LocalAdapter {
    pub fn new(model_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self { model_id: model_id.into(), transport }
    }

    /// Adapter against the default local runtime address.
    pub fn localhost(model_id: impl Into<String>) -> Self {
        Self::new(
            model_id,
            HttpTransport::new(
                ProviderKind::Local,
                default_base_url(ProviderKind::Local),
                AuthScheme::None,
                Client::new(),
            ),
        )
    }
}

#[async_trait]
impl ProviderAdapter for LocalAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let prompt = self.turn_format().render(&request.messages).into_prompt();
        debug!(model_id = %self.model_id, prompt_len = prompt.len(), "Running local model");

        let body = GenerateRequest {
            model: &self.model_id,
            prompt: &prompt,
            stream: false,
            raw: true,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };
        let response: GenerateResponse = self.transport.post_json("api/generate", &body).await?;

        let usage = Usage::from_counts(response.prompt_eval_count, response.eval_count);
        Ok(CompletionResponse::new(response.response, self.model_id.clone()).with_usage(usage))
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn turn_format(&self) -> TurnFormat {
        TurnFormat::ChatMarkup
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    /// The prompt is already templated.
    raw: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}
