//! Named workflow definitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::builtin;
use super::definition::WorkflowDefinition;
use crate::scm::SourceControl;

/// Workflows by name.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    definitions: BTreeMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in workflows, wired to `scm`.
    pub fn builtin(scm: Arc<dyn SourceControl>) -> Self {
        let mut registry = Self::new();
        registry.register(builtin::code_review(scm.clone()));
        registry.register(builtin::issue_triage(scm.clone()));
        registry.register(builtin::pr_summary(scm.clone()));
        registry.register(builtin::security_scan(scm));
        registry
    }

    /// Registers a definition, replacing any previous one of the same name.
    pub fn register(&mut self, definition: WorkflowDefinition) {
        self.definitions.insert(definition.name.clone(), Arc::new(definition));
    }

    pub fn get(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkflowDefinition> {
        self.definitions.values().map(AsRef::as_ref)
    }
}
