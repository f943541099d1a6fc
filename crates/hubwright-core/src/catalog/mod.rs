//! Model catalog and selection.
//!
//! The catalog holds the built-in remote models plus any local models found
//! by scanning a directory. It is populated at startup and read-mostly
//! afterwards.

mod descriptor;
mod local;
mod selector;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use hubwright_abstraction::ProviderKind;
use tracing::{info, warn};

pub use descriptor::{Capability, ModelDescriptor, capabilities};
pub use local::{ScanReport, scan_directory};
pub use selector::{ModelSelector, estimate_tokens, workflow_capabilities};

/// Name of the model used when nothing better qualifies.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Static and locally scanned model descriptors.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    remote: BTreeMap<String, ModelDescriptor>,
    local: BTreeMap<String, ModelDescriptor>,
    /// First-registration position of every name.
    order: BTreeMap<String, usize>,
    default_model: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    /// An empty catalog with the given default model name.
    pub fn empty(default_model: impl Into<String>) -> Self {
        Self {
            remote: BTreeMap::new(),
            local: BTreeMap::new(),
            order: BTreeMap::new(),
            default_model: default_model.into(),
        }
    }

    /// The built-in remote models.
    pub fn builtin() -> Self {
        use Capability::{Code, Reasoning, Research, Security, Summarization};

        let mut catalog = Self::empty(DEFAULT_MODEL);
        for model in [
            ModelDescriptor::remote(
                "gpt-4o",
                ProviderKind::OpenAi,
                &[Code, Reasoning, Summarization, Security],
                128_000,
                0.95,
            ),
            ModelDescriptor::remote(
                "gpt-3.5-turbo",
                ProviderKind::OpenAi,
                &[Code, Reasoning, Summarization],
                16_000,
                0.85,
            ),
            ModelDescriptor::remote(
                "claude-3-opus",
                ProviderKind::Anthropic,
                &[Reasoning, Summarization, Security],
                200_000,
                0.95,
            )
            .with_api_model("claude-3-opus-20240229"),
            ModelDescriptor::remote(
                "claude-3-sonnet",
                ProviderKind::Anthropic,
                &[Reasoning, Summarization],
                180_000,
                0.90,
            )
            .with_api_model("claude-3-sonnet-20240229"),
            ModelDescriptor::remote(
                "codellama-34b",
                ProviderKind::HuggingFace,
                &[Code],
                16_000,
                0.85,
            )
            .with_api_model("codellama/CodeLlama-34b-Instruct-hf"),
            ModelDescriptor::remote(
                "mistral-7b",
                ProviderKind::HuggingFace,
                &[Reasoning, Summarization],
                8_000,
                0.80,
            )
            .with_api_model("mistralai/Mistral-7B-Instruct-v0.2"),
            ModelDescriptor::remote(
                "llama-3-70b",
                ProviderKind::Replicate,
                &[Code, Reasoning, Summarization],
                8_000,
                0.85,
            )
            .with_api_model("meta/meta-llama-3-70b-instruct"),
            ModelDescriptor::remote(
                "pplx-7b-online",
                ProviderKind::Perplexity,
                &[Research, Summarization],
                4_000,
                0.80,
            ),
            ModelDescriptor::remote(
                "command-r",
                ProviderKind::Cohere,
                &[Reasoning, Summarization],
                128_000,
                0.82,
            ),
        ] {
            catalog.insert(model);
        }
        catalog
    }

    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_model = name.into();
        self
    }

    pub fn default_model_name(&self) -> &str {
        &self.default_model
    }

    /// The configured default model, if it is registered.
    pub fn default_model(&self) -> Option<&ModelDescriptor> {
        self.get(&self.default_model)
    }

    /// Registers or replaces a descriptor. Invalid descriptors are rejected.
    pub fn register(&mut self, model: ModelDescriptor) -> Result<(), String> {
        model.validate().map_err(|e| format!("{}: {}", model.name, e))?;
        self.insert(model);
        Ok(())
    }

    fn insert(&mut self, model: ModelDescriptor) {
        let next = self.order.len();
        self.order.entry(model.name.clone()).or_insert(next);
        let registry = if model.local { &mut self.local } else { &mut self.remote };
        registry.insert(model.name.clone(), model);
    }

    /// Declaration position of `name`. Replacing a model keeps its position.
    pub fn position(&self, name: &str) -> usize {
        self.order.get(name).copied().unwrap_or(usize::MAX)
    }

    /// Exact lookup, local registry first.
    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.local.get(name).or_else(|| self.remote.get(name))
    }

    /// Every model, local ones first, each group in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        let mut local: Vec<&ModelDescriptor> = self.local.values().collect();
        local.sort_by_key(|m| self.position(&m.name));
        let mut remote: Vec<&ModelDescriptor> =
            self.remote.values().filter(|m| !self.local.contains_key(&m.name)).collect();
        remote.sort_by_key(|m| self.position(&m.name));
        local.into_iter().chain(remote)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }

    /// Providers some catalog model depends on.
    pub fn providers(&self) -> BTreeSet<ProviderKind> {
        self.iter().map(|m| m.provider).collect()
    }

    /// Scans `dir` for local model descriptors and registers the valid ones.
    ///
    /// Never fails: a missing directory is created, bad entries are skipped.
    pub async fn scan_local(&mut self, dir: &Path) -> ScanReport {
        let (models, report) = scan_directory(dir).await;
        self.register_scanned(dir, models, report)
    }

    /// Registers the output of [`scan_directory`] for `dir`.
    pub fn register_scanned(
        &mut self,
        dir: &Path,
        models: Vec<ModelDescriptor>,
        mut report: ScanReport,
    ) -> ScanReport {
        for model in models {
            let name = model.name.clone();
            if let Err(e) = self.register(model) {
                warn!(model = %name, error = %e, "Rejected local model");
                report.registered.retain(|n| n != &name);
                report.skipped.push((name, e));
            }
        }
        info!(
            dir = %dir.display(),
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            "Local model scan complete"
        );
        report
    }
}
