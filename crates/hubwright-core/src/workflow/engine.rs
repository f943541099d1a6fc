//! Core workflow execution engine.
//!
//! Runs a definition's steps strictly in order over one accumulating
//! context. A failing non-critical step is recorded and skipped; a failing
//! critical step ends the run.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hubwright_abstraction::{ProviderAdapter, ProviderError};
use hubwright_models::ProviderFactory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::definition::{Context, WorkflowDefinition};
use super::error::WorkflowError;
use super::registry::WorkflowRegistry;
use crate::catalog::{ModelCatalog, ModelDescriptor, ModelSelector, estimate_tokens};
use crate::credentials::CredentialStore;

/// Turns a selected model and its secret into a live adapter.
pub trait AdapterResolver: Send + Sync {
    fn resolve(
        &self,
        model: &ModelDescriptor,
        secret: Option<&str>,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError>;
}

impl AdapterResolver for ProviderFactory {
    fn resolve(
        &self,
        model: &ModelDescriptor,
        secret: Option<&str>,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.create(model.provider, model.provider_model_id(), secret)
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running { step: usize },
    Succeeded,
    Failed,
}

/// What a step produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { output: Value },
    Error { error: String },
}

/// Result of executing one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StepOutcome::Success { .. })
    }

    pub fn output(&self) -> Option<&Value> {
        match &self.outcome {
            StepOutcome::Success { output } => Some(output),
            StepOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Success { .. } => None,
            StepOutcome::Error { error } => Some(error),
        }
    }
}

/// Outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub workflow_name: String,
    pub model_name: Option<String>,
    /// Per-step results in execution order.
    pub steps: Vec<StepRecord>,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Context after the last executed step.
    #[serde(default)]
    pub context: Context,
}

impl WorkflowExecutionResult {
    pub fn new(workflow_name: impl Into<String>, model_name: Option<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            model_name,
            steps: Vec::new(),
            status: WorkflowStatus::Pending,
            error: None,
            context: Context::new(),
        }
    }

    /// A run that failed before any step executed.
    pub fn failed(
        workflow_name: impl Into<String>,
        model_name: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: WorkflowStatus::Failed,
            error: Some(error.into()),
            ..Self::new(workflow_name, model_name)
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Succeeded
    }
}

/// Executes workflows against the shared catalog and credential store.
#[derive(Clone)]
pub struct WorkflowEngine {
    catalog: Arc<RwLock<ModelCatalog>>,
    credentials: Arc<CredentialStore>,
    resolver: Arc<dyn AdapterResolver>,
    registry: Arc<WorkflowRegistry>,
}

impl WorkflowEngine {
    pub fn new(
        catalog: Arc<RwLock<ModelCatalog>>,
        credentials: Arc<CredentialStore>,
        resolver: Arc<dyn AdapterResolver>,
        registry: Arc<WorkflowRegistry>,
    ) -> Self {
        Self { catalog, credentials, resolver, registry }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Runs the named workflow, choosing a model by preference or capabilities.
    ///
    /// Never fails: every error is reported through the result's `error` field.
    pub async fn run(
        &self,
        name: &str,
        context: Context,
        preference: Option<&str>,
    ) -> WorkflowExecutionResult {
        let Some(definition) = self.registry.get(name) else {
            warn!(workflow = %name, "Unknown workflow requested");
            return WorkflowExecutionResult::failed(
                name,
                None,
                WorkflowError::UnknownWorkflow(name.to_string()).to_string(),
            );
        };

        let model = self.select_model(&definition, &context, preference).await;
        let model_name = model.as_ref().map(|m| m.name.clone());

        match self.execute(&definition, context, model.as_ref()).await {
            Ok(result) => result,
            Err(WorkflowError::CriticalStep { partial, .. }) => *partial,
            Err(e) => WorkflowExecutionResult::failed(name, model_name, e.to_string()),
        }
    }

    async fn select_model(
        &self,
        definition: &WorkflowDefinition,
        context: &Context,
        preference: Option<&str>,
    ) -> Option<ModelDescriptor> {
        let credentialed = self.credentials.providers().await;
        let catalog = self.catalog.read().await;
        let selector = ModelSelector::new(&catalog).with_credentials(credentialed);
        match preference.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => selector.select_by_preference(name).cloned(),
            None => selector
                .select_by_capabilities(&definition.required_capabilities, estimate_tokens(context))
                .cloned(),
        }
    }

    /// Executes `definition` with `model`.
    ///
    /// # Errors
    /// [`WorkflowError::Configuration`] when the model is missing or its
    /// provider has no secret; nothing runs in that case.
    /// [`WorkflowError::CriticalStep`] when a critical step fails.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        context: Context,
        model: Option<&ModelDescriptor>,
    ) -> Result<WorkflowExecutionResult, WorkflowError> {
        let model = model.ok_or_else(|| {
            WorkflowError::Configuration(format!("no model available for {}", definition.name))
        })?;

        let secret = if model.provider.requires_secret() {
            let secret = self.credentials.get(model.provider).await.ok_or_else(|| {
                WorkflowError::Configuration(format!(
                    "no credential for provider {} (model {})",
                    model.provider, model.name
                ))
            })?;
            Some(secret)
        } else {
            None
        };

        let adapter = self
            .resolver
            .resolve(model, secret.as_deref())
            .map_err(|e| WorkflowError::Configuration(e.to_string()))?;

        execute_steps(definition, context, &model.name, adapter.as_ref()).await
    }
}

/// Runs every step of `definition` against an already-resolved adapter.
pub async fn execute_steps(
    definition: &WorkflowDefinition,
    mut context: Context,
    model_name: &str,
    adapter: &dyn ProviderAdapter,
) -> Result<WorkflowExecutionResult, WorkflowError> {
    let mut result =
        WorkflowExecutionResult::new(definition.name.clone(), Some(model_name.to_string()));
    info!(workflow = %definition.name, model = %model_name, steps = definition.steps.len(), "Workflow started");

    for (index, step) in definition.steps.iter().enumerate() {
        result.status = WorkflowStatus::Running { step: index };
        debug!(workflow = %definition.name, step = %step.name, index, "Running step");

        let started_at = Utc::now();
        let timer = Instant::now();
        let outcome = step.handler.run(&context, adapter).await;
        let duration_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(output) => {
                for (key, value) in &output {
                    context.insert(key.clone(), value.clone());
                }
                result.steps.push(StepRecord {
                    name: step.name.clone(),
                    outcome: StepOutcome::Success { output: Value::Object(output) },
                    started_at,
                    duration_ms,
                });
            }
            Err(e) => {
                let message = e.to_string();
                result.steps.push(StepRecord {
                    name: step.name.clone(),
                    outcome: StepOutcome::Error { error: message.clone() },
                    started_at,
                    duration_ms,
                });

                if definition.is_critical(&step.name) {
                    error!(workflow = %definition.name, step = %step.name, error = %message, "Critical step failed");
                    result.status = WorkflowStatus::Failed;
                    result.error = Some(format!("Critical step '{}' failed: {}", step.name, message));
                    result.context = context;
                    return Err(WorkflowError::CriticalStep {
                        workflow: definition.name.clone(),
                        step: step.name.clone(),
                        message,
                        partial: Box::new(result),
                    });
                }
                warn!(workflow = %definition.name, step = %step.name, error = %message, "Step failed, continuing");
            }
        }
    }

    result.status = WorkflowStatus::Succeeded;
    result.context = context;
    info!(workflow = %definition.name, model = %model_name, "Workflow completed");
    Ok(result)
}
