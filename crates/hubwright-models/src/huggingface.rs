//! Hugging Face hosted inference.

use async_trait::async_trait;
use hubwright_abstraction::{
    CompletionRequest, CompletionResponse, ProviderAdapter, ProviderError, ProviderKind,
    TurnFormat,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::HttpTransport;

#[derive(Debug, Clone)]
pub struct HuggingFaceAdapter {
    /// Repository id, e.g. `codellama/CodeLlama-34b-Instruct-hf`.
    model_id: String,
    transport: HttpTransport,
}

impl HuggingFaceAdapter {
    pub fn new(model_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self { model_id: model_id.into(), transport }
    }

    pub fn with_api_key(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(model_id, HttpTransport::for_provider(ProviderKind::HuggingFace, api_key))
    }
}

#[async_trait]
impl ProviderAdapter for HuggingFaceAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let prompt = self.turn_format().render(&request.messages).into_prompt();
        debug!(model_id = %self.model_id, prompt_len = prompt.len(), "Requesting HF inference");

        let body = InferenceRequest {
            inputs: &prompt,
            parameters: InferenceParameters {
                max_new_tokens: request.max_tokens,
                temperature: request.temperature,
                return_full_text: false,
            },
        };
        let response: InferenceResponse = self.transport.post_json(&self.model_id, &body).await?;

        let content = match response {
            InferenceResponse::Batch(items) => {
                items.into_iter().next().map(|g| g.generated_text).unwrap_or_default()
            }
            InferenceResponse::Single(item) => item.generated_text,
        };

        Ok(CompletionResponse::new(content, self.model_id.clone()))
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn turn_format(&self) -> TurnFormat {
        TurnFormat::PlainJoin
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<Generation>),
    Single(Generation),
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    generated_text: String,
}
