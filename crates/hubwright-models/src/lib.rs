//! Provider adapters for Hubwright.
//!
//! This crate provides concrete implementations of the `ProviderAdapter` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and development
//! - **OpenAI / Perplexity**: OpenAI-compatible chat completions
//! - **Anthropic**: Messages API with a dedicated system field
//! - **Hugging Face**: Hosted inference, single prompt string
//! - **Replicate**: Submit-then-poll predictions
//! - **Cohere**: Generate API, last user turn only
//! - **Local**: Ollama-compatible runtime, no API key

pub mod anthropic;
pub mod cohere;
pub mod factory;
pub mod huggingface;
pub mod local;
pub mod openai;
pub mod replicate;
pub mod transport;

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use hubwright_abstraction::{
    CompletionRequest, CompletionResponse, ProviderAdapter, ProviderError, ProviderKind,
    TurnFormat,
};
use tracing::debug;

pub use anthropic::AnthropicAdapter;
pub use cohere::CohereAdapter;
pub use factory::{FactoryConfig, FactoryError, ProviderFactory};
pub use huggingface::HuggingFaceAdapter;
pub use local::LocalAdapter;
pub use openai::OpenAiAdapter;
pub use replicate::{PollPolicy, ReplicateAdapter};
pub use transport::{AuthScheme, HttpTransport};

/// A scripted `ProviderAdapter` for tests and dry runs.
///
/// Queued replies are returned in order; once the queue is empty every call
/// echoes the last user turn prefixed with the model id.
#[derive(Debug)]
pub struct MockAdapter {
    provider: ProviderKind,
    model_id: String,
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockAdapter {
    pub fn new(provider: ProviderKind, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a successful reply.
    #[must_use]
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.push(Ok(content.into()));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        let err = ProviderError::transport(self.provider, message);
        self.push(Err(err));
        self
    }

    fn push(&self, reply: Result<String, ProviderError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        debug!(model_id = %self.model_id, messages = request.messages.len(), "MockAdapter completing");
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let queued = self.replies.lock().ok().and_then(|mut replies| replies.pop_front());
        let content = match queued {
            Some(reply) => reply?,
            None => {
                let last = TurnFormat::LastUserTurn.render(&request.messages).into_prompt();
                format!("[{}] {}", self.model_id, last)
            }
        };
        Ok(CompletionResponse::new(content, self.model_id.clone()))
    }

    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn turn_format(&self) -> TurnFormat {
        TurnFormat::RoleTagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubwright_abstraction::ChatMessage;

    #[tokio::test]
    async fn test_mock_adapter_replays_queue_then_echoes() {
        let mock = MockAdapter::new(ProviderKind::OpenAi, "gpt-test").reply("first").fail("boom");
        let request = CompletionRequest::new(vec![ChatMessage::user("hello")]);

        assert_eq!(mock.complete(&request).await.unwrap().content, "first");
        assert!(mock.complete(&request).await.is_err());
        assert_eq!(mock.complete(&request).await.unwrap().content, "[gpt-test] hello");
        assert_eq!(mock.requests().len(), 3);
    }
}
