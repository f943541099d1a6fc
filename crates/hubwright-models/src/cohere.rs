//! Cohere generate API.

use async_trait::async_trait;
use hubwright_abstraction::{
    CompletionRequest, CompletionResponse, ProviderAdapter, ProviderError, ProviderKind,
    TurnFormat, Usage,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::HttpTransport;

#[derive(Debug, Clone)]
pub struct CohereAdapter {
    model_id: String,
    transport: HttpTransport,
}

impl CohereAdapter {
    pub fn new(model_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self { model_id: model_id.into(), transport }
    }

    pub fn with_api_key(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(model_id, HttpTransport::for_provider(ProviderKind::Cohere, api_key))
    }
}

#[async_trait]
impl ProviderAdapter for CohereAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let prompt = self.turn_format().render(&request.messages).into_prompt();
        debug!(model_id = %self.model_id, prompt_len = prompt.len(), "Requesting Cohere generation");

        let body = GenerateRequest {
            model: &self.model_id,
            prompt: &prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let response: GenerateResponse = self.transport.post_json("generate", &body).await?;

        let content = response
            .generations
            .into_iter()
            .next()
            .map(|g| g.text)
            .ok_or_else(|| ProviderError::decode(ProviderKind::Cohere, "No generations in response"))?;

        let usage = response
            .meta
            .and_then(|m| m.billed_units)
            .map_or_else(Usage::default, |b| Usage::from_counts(b.input_tokens, b.output_tokens));

        Ok(CompletionResponse::new(content, self.model_id.clone()).with_usage(usage))
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Cohere
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn turn_format(&self) -> TurnFormat {
        TurnFormat::LastUserTurn
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    billed_units: Option<BilledUnits>,
}

#[derive(Debug, Deserialize)]
struct BilledUnits {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}
