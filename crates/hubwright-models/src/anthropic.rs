//! Anthropic messages API.

use async_trait::async_trait;
use hubwright_abstraction::{
    ChatMessage, CompletionRequest, CompletionResponse, ProviderAdapter, ProviderError,
    ProviderKind, RenderedTurns, TurnFormat, Usage,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::HttpTransport;

/// API version pinned on every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    model_id: String,
    transport: HttpTransport,
}

impl AnthropicAdapter {
    pub fn new(model_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self {
            model_id: model_id.into(),
            transport: transport.with_header("anthropic-version", ANTHROPIC_VERSION),
        }
    }

    pub fn with_api_key(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(model_id, HttpTransport::for_provider(ProviderKind::Anthropic, api_key))
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let RenderedTurns::Messages { system, messages } =
            self.turn_format().render(&request.messages)
        else {
            return Err(ProviderError::configuration(
                ProviderKind::Anthropic,
                "unexpected prompt rendering",
            ));
        };

        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            has_system = system.is_some(),
            "Requesting Anthropic message"
        );

        let body = MessagesRequest {
            model: &self.model_id,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: system.as_deref(),
            messages: &messages,
        };
        let response: MessagesResponse = self.transport.post_json("messages", &body).await?;

        let content: String = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let usage = response
            .usage
            .map_or_else(Usage::default, |u| Usage::from_counts(u.input_tokens, u.output_tokens));

        Ok(CompletionResponse::new(content, response.model.unwrap_or_else(|| self.model_id.clone()))
            .with_usage(usage))
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn turn_format(&self) -> TurnFormat {
        TurnFormat::SystemField
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}
