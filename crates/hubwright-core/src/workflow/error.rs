//! Workflow error types.

use hubwright_abstraction::ProviderError;
use thiserror::Error;

use super::engine::WorkflowExecutionResult;
use crate::scm::ScmError;

/// Failures that abort a workflow run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A required model or secret is missing; no step ran.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No workflow is registered under this name.
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    /// A critical step failed; remaining steps were not run.
    #[error("Critical step '{step}' of {workflow} failed: {message}")]
    CriticalStep {
        workflow: String,
        step: String,
        message: String,
        /// Everything recorded up to and including the failed step.
        partial: Box<WorkflowExecutionResult>,
    },
}

/// A single step's failure.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("missing context field '{0}'")]
    MissingContext(String),

    #[error(transparent)]
    SourceControl(#[from] ScmError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            StepError::MissingContext("pull_number".into()).to_string(),
            "missing context field 'pull_number'"
        );
        assert_eq!(
            WorkflowError::Configuration("no secret for openai".into()).to_string(),
            "Configuration error: no secret for openai"
        );
    }
}
