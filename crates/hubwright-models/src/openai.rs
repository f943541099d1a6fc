//! OpenAI-compatible chat completions.
//!
//! Serves both OpenAI and Perplexity, which share the `/chat/completions`
//! request and response shapes.

use async_trait::async_trait;
use hubwright_abstraction::{
    ChatMessage, CompletionRequest, CompletionResponse, ProviderAdapter, ProviderError,
    ProviderKind, RenderedTurns, TurnFormat, Usage,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::HttpTransport;

/// Adapter for any provider speaking the OpenAI chat completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    model_id: String,
    transport: HttpTransport,
}

impl OpenAiAdapter {
    /// Builds an adapter over an existing transport; the transport decides the provider.
    pub fn new(model_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self { model_id: model_id.into(), transport }
    }

    /// OpenAI's public endpoint with the given key.
    pub fn with_api_key(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(model_id, HttpTransport::for_provider(ProviderKind::OpenAi, api_key))
    }

    /// Perplexity's public endpoint with the given key.
    pub fn perplexity(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(model_id, HttpTransport::for_provider(ProviderKind::Perplexity, api_key))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let provider = self.provider();
        let RenderedTurns::Messages { messages, .. } = self.turn_format().render(&request.messages)
        else {
            return Err(ProviderError::configuration(provider, "unexpected prompt rendering"));
        };

        debug!(
            provider = %provider,
            model_id = %self.model_id,
            message_count = messages.len(),
            "Requesting chat completion"
        );

        let body = ChatRequest {
            model: &self.model_id,
            messages: &messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let response: ChatResponse = self.transport.post_json("chat/completions", &body).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::decode(provider, "No choices in response"))?;

        let usage = response.usage.map_or_else(Usage::default, |u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse::new(content, response.model.unwrap_or_else(|| self.model_id.clone()))
            .with_usage(usage))
    }

    fn provider(&self) -> ProviderKind {
        self.transport.provider()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn turn_format(&self) -> TurnFormat {
        TurnFormat::RoleTagged
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_role_tags() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            max_tokens: 1000,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_perplexity_reports_its_provider() {
        let adapter = OpenAiAdapter::perplexity("pplx-7b-online", "key");
        assert_eq!(adapter.provider(), ProviderKind::Perplexity);
        assert_eq!(adapter.model_id(), "pplx-7b-online");
    }
}
