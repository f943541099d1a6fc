//! Workflow definitions and the step seam.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hubwright_abstraction::ProviderAdapter;
use serde_json::{Map, Value};

use super::error::StepError;
use crate::catalog::{Capability, workflow_capabilities};

/// Shared, accumulating workflow context.
pub type Context = Map<String, Value>;

/// The logic of one workflow step.
///
/// Returns the fields to merge into the context for later steps.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn run(&self, context: &Context, adapter: &dyn ProviderAdapter) -> Result<Context, StepError>;
}

/// Adapts a synchronous closure into a [`StepHandler`].
pub struct FnStep<F>(pub F);

#[async_trait]
impl<F> StepHandler for FnStep<F>
where
    F: Fn(&Context) -> Result<Context, StepError> + Send + Sync,
{
    async fn run(&self, context: &Context, _adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        (self.0)(context)
    }
}

/// One named step.
#[derive(Clone)]
pub struct WorkflowStep {
    pub name: String,
    pub description: String,
    pub handler: Arc<dyn StepHandler>,
}

impl fmt::Debug for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowStep")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// An ordered step pipeline with a set of critical steps.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    pub critical: BTreeSet<String>,
    pub required_capabilities: BTreeSet<Capability>,
}

impl WorkflowDefinition {
    /// Starts a definition; required capabilities default from the workflow name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let required_capabilities = workflow_capabilities(&name);
        Self {
            name,
            description: String::new(),
            steps: Vec::new(),
            critical: BTreeSet::new(),
            required_capabilities,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn requires(mut self, caps: &[Capability]) -> Self {
        self.required_capabilities = caps.iter().copied().collect();
        self
    }

    /// Appends a non-critical step.
    #[must_use]
    pub fn step(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        self.steps.push(WorkflowStep { name: name.into(), description: description.into(), handler });
        self
    }

    /// Appends a step whose failure halts the workflow.
    #[must_use]
    pub fn critical_step(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        let name = name.into();
        self.critical.insert(name.clone());
        self.step(name, description, handler)
    }

    pub fn is_critical(&self, step: &str) -> bool {
        self.critical.contains(step)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}
