//! Multi-step workflows over a model and the source-control API.
//!
//! A [`WorkflowDefinition`] is an ordered list of steps sharing one JSON
//! context. [`WorkflowEngine`] picks a model, resolves its credential and
//! adapter, then runs the steps.

mod builtin;
mod definition;
mod engine;
mod error;
mod registry;

pub use builtin::{extract_numbered_issues, is_source_file};
pub use definition::{Context, FnStep, StepHandler, WorkflowDefinition, WorkflowStep};
pub use engine::{
    AdapterResolver, StepOutcome, StepRecord, WorkflowEngine, WorkflowExecutionResult,
    WorkflowStatus, execute_steps,
};
pub use error::{StepError, WorkflowError};
pub use registry::WorkflowRegistry;
