//! Replicate predictions.
//!
//! Replicate is asynchronous: a prediction is submitted, then its status is
//! polled until it reaches a terminal state. Polling is bounded by
//! [`PollPolicy::max_attempts`] and stops early when the shared
//! cancellation token fires.

use std::time::Duration;

use async_trait::async_trait;
use hubwright_abstraction::{
    CompletionRequest, CompletionResponse, ProviderAdapter, ProviderError, ProviderErrorKind,
    ProviderKind, TurnFormat,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::HttpTransport;

/// How often and how long to poll a pending prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before each status request.
    pub interval: Duration,
    /// Status requests issued before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(1), max_attempts: 600 }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicateAdapter {
    /// Model version hash.
    model_id: String,
    transport: HttpTransport,
    poll: PollPolicy,
    cancel: CancellationToken,
}

impl ReplicateAdapter {
    pub fn new(model_id: impl Into<String>, transport: HttpTransport) -> Self {
        Self {
            model_id: model_id.into(),
            transport,
            poll: PollPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_api_key(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(model_id, HttpTransport::for_provider(ProviderKind::Replicate, api_key))
    }

    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn wait_for(&self, mut prediction: Prediction) -> Result<Prediction, ProviderError> {
        let mut attempts = 0;
        while !prediction.status.is_terminal() {
            if attempts >= self.poll.max_attempts {
                warn!(prediction_id = %prediction.id, attempts, "Prediction polling gave up");
                return Err(ProviderError::new(
                    ProviderKind::Replicate,
                    ProviderErrorKind::Timeout,
                    format!(
                        "prediction {} still {} after {} polls",
                        prediction.id,
                        prediction.status.as_str(),
                        attempts
                    ),
                ));
            }

            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!(prediction_id = %prediction.id, "Prediction polling cancelled");
                    return Err(ProviderError::new(
                        ProviderKind::Replicate,
                        ProviderErrorKind::Cancelled,
                        format!("polling for prediction {} was cancelled", prediction.id),
                    ));
                }
                () = tokio::time::sleep(self.poll.interval) => {}
            }

            attempts += 1;
            let path = format!("predictions/{}", prediction.id);
            prediction = self.transport.get_json(&path).await?;
            debug!(
                prediction_id = %prediction.id,
                status = prediction.status.as_str(),
                attempts,
                "Polled prediction"
            );
        }
        Ok(prediction)
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let prompt = self.turn_format().render(&request.messages).into_prompt();
        let body = PredictionRequest {
            version: &self.model_id,
            input: PredictionInput {
                prompt: &prompt,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let submitted: Prediction = self.transport.post_json("predictions", &body).await?;
        debug!(prediction_id = %submitted.id, "Submitted prediction");

        let finished = self.wait_for(submitted).await?;
        if finished.status == PredictionStatus::Succeeded {
            Ok(CompletionResponse::new(output_text(&finished.output), self.model_id.clone()))
        } else {
            let reason = finished
                .error
                .as_ref()
                .map_or_else(|| finished.status.as_str().to_string(), value_text);
            Err(ProviderError::new(
                ProviderKind::Replicate,
                ProviderErrorKind::Failed,
                format!("prediction failed: {}", reason),
            ))
        }
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Replicate
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn turn_format(&self) -> TurnFormat {
        TurnFormat::XmlTagged
    }
}

/// Streaming models return a list of chunks; others return a single string.
fn output_text(output: &Value) -> String {
    match output {
        Value::Null => String::new(),
        Value::Array(parts) => parts.iter().map(value_text).collect(),
        other => value_text(other),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    version: &'a str,
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
}
