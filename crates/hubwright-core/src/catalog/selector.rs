//! Deterministic model selection.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use hubwright_abstraction::ProviderKind;
use serde::Serialize;
use tracing::{debug, warn};

use super::ModelCatalog;
use super::descriptor::{Capability, ModelDescriptor};

/// Capabilities each built-in workflow needs; unknown workflows need reasoning.
pub fn workflow_capabilities(workflow: &str) -> BTreeSet<Capability> {
    use Capability::{Code, Reasoning, Security, Summarization};

    let caps: &[Capability] = match workflow {
        "code-review" => &[Code, Reasoning],
        "issue-triage" => &[Reasoning, Summarization],
        "pr-summary" => &[Summarization, Code],
        "security-scan" => &[Security, Code],
        _ => &[Reasoning],
    };
    caps.iter().copied().collect()
}

/// Rough token count: one token per four characters of serialized JSON.
pub fn estimate_tokens<T: Serialize + ?Sized>(value: &T) -> u32 {
    let len = serde_json::to_string(value).map_or(0, |s| s.len());
    len.div_ceil(4).try_into().unwrap_or(u32::MAX)
}

/// Picks models out of a catalog.
///
/// Identical catalog and inputs always yield the identical model.
#[derive(Debug, Clone)]
pub struct ModelSelector<'a> {
    catalog: &'a ModelCatalog,
    credentialed: Option<BTreeSet<ProviderKind>>,
}

impl<'a> ModelSelector<'a> {
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog, credentialed: None }
    }

    /// Restricts capability selection to models whose provider needs no
    /// secret or is in `providers`.
    #[must_use]
    pub fn with_credentials(mut self, providers: impl IntoIterator<Item = ProviderKind>) -> Self {
        self.credentialed = Some(providers.into_iter().collect());
        self
    }

    fn usable(&self, model: &ModelDescriptor) -> bool {
        match &self.credentialed {
            Some(providers) => {
                model.local || !model.provider.requires_secret() || providers.contains(&model.provider)
            }
            None => true,
        }
    }

    /// Exact lookup by name, local models first.
    ///
    /// An unknown name falls back to the default model with a warning.
    pub fn select_by_preference(&self, name: &str) -> Option<&'a ModelDescriptor> {
        if let Some(model) = self.catalog.get(name) {
            debug!(model = %model.name, local = model.local, "Selected preferred model");
            return Some(model);
        }
        warn!(
            requested = %name,
            fallback = %self.catalog.default_model_name(),
            "Preferred model not found, using default"
        );
        self.catalog.default_model()
    }

    /// Best model covering `required` whose context window fits `estimated_tokens`.
    ///
    /// Candidates are ranked by performance (descending), then local before
    /// remote, then catalog declaration order. With no candidate the default
    /// model is returned with a warning.
    pub fn select_by_capabilities(
        &self,
        required: &BTreeSet<Capability>,
        estimated_tokens: u32,
    ) -> Option<&'a ModelDescriptor> {
        let mut candidates: Vec<&ModelDescriptor> = self
            .catalog
            .iter()
            .filter(|m| self.usable(m))
            .filter(|m| m.covers(required) && m.context_window >= estimated_tokens)
            .collect();
        candidates.sort_by(|a, b| self.rank(a, b));

        if let Some(model) = candidates.first() {
            debug!(
                model = %model.name,
                candidates = candidates.len(),
                estimated_tokens,
                "Selected model by capabilities"
            );
            return Some(*model);
        }

        let required: Vec<&str> = required.iter().map(Capability::as_str).collect();
        warn!(
            required = ?required,
            estimated_tokens,
            fallback = %self.catalog.default_model_name(),
            "No model satisfies requirements, using default"
        );
        self.catalog.default_model()
    }

    fn rank(&self, a: &ModelDescriptor, b: &ModelDescriptor) -> Ordering {
        b.performance
            .total_cmp(&a.performance)
            .then_with(|| b.local.cmp(&a.local))
            .then_with(|| self.catalog.position(&a.name).cmp(&self.catalog.position(&b.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::capabilities;

    #[test]
    fn test_preference_exact_and_fallback() {
        let catalog = ModelCatalog::builtin();
        let selector = ModelSelector::new(&catalog);

        assert_eq!(selector.select_by_preference("claude-3-opus").unwrap().name, "claude-3-opus");
        assert_eq!(selector.select_by_preference("gpt-9").unwrap().name, "gpt-3.5-turbo");
    }

    #[test]
    fn test_preference_prefers_local() {
        let mut catalog = ModelCatalog::builtin();
        catalog
            .register(ModelDescriptor::local("mistral-7b", &[Capability::Chat], 4096, 0.5, "/m"))
            .unwrap();
        let selector = ModelSelector::new(&catalog);
        assert!(selector.select_by_preference("mistral-7b").unwrap().local);
    }

    #[test]
    fn test_capabilities_highest_performance_wins() {
        let catalog = ModelCatalog::builtin();
        let selector = ModelSelector::new(&catalog);

        let model = selector
            .select_by_capabilities(&capabilities(&[Capability::Security, Capability::Code]), 1000)
            .unwrap();
        assert_eq!(model.name, "gpt-4o");

        // claude-3-opus and gpt-4o tie at 0.95; gpt-4o is declared first.
        let model = selector
            .select_by_capabilities(&capabilities(&[Capability::Reasoning]), 1000)
            .unwrap();
        assert_eq!(model.name, "gpt-4o");
    }

    #[test]
    fn test_credentials_restrict_candidates() {
        let mut catalog = ModelCatalog::builtin();
        catalog
            .register(ModelDescriptor::local("tiny", &[Capability::Reasoning], 4096, 0.4, "/m/tiny"))
            .unwrap();
        let reasoning = capabilities(&[Capability::Reasoning]);

        let anthropic_only = ModelSelector::new(&catalog).with_credentials([ProviderKind::Anthropic]);
        assert_eq!(anthropic_only.select_by_capabilities(&reasoning, 1000).unwrap().name, "claude-3-opus");

        let none = ModelSelector::new(&catalog).with_credentials(Vec::new());
        assert_eq!(none.select_by_capabilities(&reasoning, 1000).unwrap().name, "tiny");

        // Preferences are explicit and bypass the restriction.
        assert_eq!(none.select_by_preference("gpt-4o").unwrap().name, "gpt-4o");
    }

    #[test]
    fn test_context_window_filters() {
        let catalog = ModelCatalog::builtin();
        let selector = ModelSelector::new(&catalog);

        let model = selector
            .select_by_capabilities(&capabilities(&[Capability::Reasoning]), 190_000)
            .unwrap();
        assert_eq!(model.name, "claude-3-opus");
        assert!(model.context_window >= 190_000);
    }

    #[test]
    fn test_unsatisfiable_falls_back_to_default() {
        let catalog = ModelCatalog::builtin();
        let selector = ModelSelector::new(&catalog);

        let model = selector
            .select_by_capabilities(&capabilities(&[Capability::Research, Capability::Code]), 10)
            .unwrap();
        assert_eq!(model.name, "gpt-3.5-turbo");
    }

    #[test]
    fn test_local_wins_performance_tie() {
        let mut catalog = ModelCatalog::empty("remote");
        catalog
            .register(ModelDescriptor::remote("remote", ProviderKind::OpenAi, &[Capability::Code], 8000, 0.7))
            .unwrap();
        catalog
            .register(ModelDescriptor::local("zz-local", &[Capability::Code], 8000, 0.7, "/m/zz"))
            .unwrap();

        let selector = ModelSelector::new(&catalog);
        let model = selector.select_by_capabilities(&capabilities(&[Capability::Code]), 100).unwrap();
        assert_eq!(model.name, "zz-local");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let catalog = ModelCatalog::builtin();
        let selector = ModelSelector::new(&catalog);
        let required = capabilities(&[Capability::Summarization]);
        let first = selector.select_by_capabilities(&required, 500).unwrap().name.clone();
        for _ in 0..10 {
            assert_eq!(selector.select_by_capabilities(&required, 500).unwrap().name, first);
        }
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens("abc"), 2); // "\"abc\"" is 5 chars
        assert_eq!(estimate_tokens(&serde_json::json!({})), 1);
        assert_eq!(workflow_capabilities("unknown"), capabilities(&[Capability::Reasoning]));
    }
}
