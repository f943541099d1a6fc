//! Source-control API capability.
//!
//! The bot only needs an opaque `request(method, path, params) -> JSON`
//! call. [`GitHubClient`] is a thin reqwest implementation;
//! [`OfflineSourceControl`] answers from canned responses and records
//! writes, for dry runs and tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error};

/// Default GitHub REST endpoint.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Source-control request failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScmError {
    #[error("source control request failed: {0}")]
    Transport(String),

    #[error("source control returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid source control response: {0}")]
    Decode(String),

    #[error("source control not configured: {0}")]
    NotConfigured(String),
}

/// The repository host API, reduced to one call.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Performs one API call. `params` become the query string for GET and
    /// the JSON body otherwise.
    async fn request(&self, method: Method, path: &str, params: Value) -> Result<Value, ScmError>;

    async fn get(&self, path: &str, params: Value) -> Result<Value, ScmError> {
        self.request(Method::GET, path, params).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ScmError> {
        self.request(Method::POST, path, body).await
    }

    /// Posts a comment on an issue or pull request.
    async fn comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Value, ScmError> {
        let path = format!("/repos/{}/{}/issues/{}/comments", owner, repo, number);
        self.post(&path, json!({ "body": body })).await
    }
}

/// GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(
        api_base: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ScmError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hubwright/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScmError::NotConfigured(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn query_pairs(params: &Value) -> Vec<(String, String)> {
        params
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| {
                        let value = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                        (k.clone(), value)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn request(&self, method: Method, path: &str, params: Value) -> Result<Value, ScmError> {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        debug!(method = %method, url = %url, "Source control request");

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder = if method == Method::GET {
            builder.query(&Self::query_pairs(&params))
        } else if params.is_null() {
            builder
        } else {
            builder.json(&params)
        };

        let response = builder.send().await.map_err(|e| {
            error!(url = %url, error = %e, "Source control request failed");
            ScmError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ScmError::Transport(e.to_string()))?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(ScmError::Status { status: status.as_u16(), message });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ScmError::Decode(e.to_string()))
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub params: Value,
}

/// In-memory source control: canned responses by `(method, path)`.
///
/// Unknown GETs fail with 404; unknown writes succeed with an empty object.
/// Every call is recorded.
#[derive(Debug, Default)]
pub struct OfflineSourceControl {
    responses: HashMap<(Method, String), Value>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl OfflineSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond(mut self, method: Method, path: impl Into<String>, body: Value) -> Self {
        self.responses.insert((method, path.into()), body);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Recorded non-GET calls.
    pub fn writes(&self) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.method != Method::GET).collect()
    }
}

#[async_trait]
impl SourceControl for OfflineSourceControl {
    async fn request(&self, method: Method, path: &str, params: Value) -> Result<Value, ScmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                method: method.clone(),
                path: path.to_string(),
                params,
            });
        }
        match self.responses.get(&(method.clone(), path.to_string())) {
            Some(body) => Ok(body.clone()),
            None if method == Method::GET => Err(ScmError::Status {
                status: 404,
                message: format!("Not Found: {}", path),
            }),
            None => Ok(json!({})),
        }
    }
}
