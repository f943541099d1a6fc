//! Provider abstraction layer for Hubwright.
//!
//! This crate defines the canonical completion request/response shapes and the
//! `ProviderAdapter` trait every language-model backend implements. Nothing in
//! here performs I/O; concrete adapters live in `hubwright-models`.

mod error;
mod message;
mod provider;
mod turns;

use async_trait::async_trait;

pub use error::{ProviderError, ProviderErrorKind};
pub use message::{ChatMessage, CompletionRequest, CompletionResponse, Role, Usage};
pub use provider::{ParseProviderError, ProviderKind};
pub use turns::{RenderedTurns, TurnFormat};

/// Default generation budget applied when a request does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature applied when a request does not set one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single completion backend bound to one model and one secret.
///
/// Implementations translate the canonical [`CompletionRequest`] into their
/// provider's wire format, and every failure into a [`ProviderError`].
/// Provider-specific error payloads must never escape `complete`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Performs one completion call.
    async fn complete(&self, request: &CompletionRequest)
    -> Result<CompletionResponse, ProviderError>;

    /// The provider this adapter talks to.
    fn provider(&self) -> ProviderKind;

    /// The provider-side model identifier.
    fn model_id(&self) -> &str;

    /// The turn-concatenation rule this provider declares.
    fn turn_format(&self) -> TurnFormat;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ProviderAdapter for Echo {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            match self.turn_format().render(&request.messages) {
                RenderedTurns::Prompt(prompt) => Ok(CompletionResponse::new(prompt, "echo")),
                RenderedTurns::Messages { .. } => {
                    Err(ProviderError::decode(ProviderKind::Local, "expected prompt"))
                }
            }
        }

        fn provider(&self) -> ProviderKind {
            ProviderKind::Local
        }

        fn model_id(&self) -> &str {
            "echo"
        }

        fn turn_format(&self) -> TurnFormat {
            TurnFormat::PlainJoin
        }
    }

    #[tokio::test]
    async fn test_adapter_is_object_safe() {
        let adapter: Box<dyn ProviderAdapter> = Box::new(Echo);
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
        ]);

        let response = adapter.complete(&request).await.unwrap();
        assert_eq!(response.content, "be brief\nhello");
        assert_eq!(response.model_id, "echo");
    }

    #[test]
    fn test_request_defaults() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!((request.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
    }
}
