//! Where each provider's secret may be found outside the vault.

use hubwright_abstraction::ProviderKind;

/// Environment variables checked for a provider, in order.
pub fn env_var_names(provider: ProviderKind) -> &'static [&'static str] {
    match provider {
        ProviderKind::OpenAi => &["OPENAI_API_KEY"],
        ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
        ProviderKind::HuggingFace => &["HUGGINGFACE_TOKEN", "HF_TOKEN", "HUGGINGFACE_API_KEY"],
        ProviderKind::Replicate => &["REPLICATE_API_TOKEN", "REPLICATE_API_KEY"],
        ProviderKind::Cohere => &["COHERE_API_KEY"],
        ProviderKind::Perplexity => &["PERPLEXITY_API_KEY"],
        ProviderKind::Local => &[],
    }
}

/// Config files checked for a provider, relative to the home directory, in order.
pub fn config_file_paths(provider: ProviderKind) -> &'static [&'static str] {
    match provider {
        ProviderKind::OpenAi => &[".openai", ".openai.json", ".config/openai"],
        ProviderKind::Anthropic => &[".anthropic", ".anthropic.json", ".config/anthropic"],
        ProviderKind::HuggingFace => &[".huggingface", ".config/huggingface"],
        ProviderKind::Replicate => &[".replicate.json", ".config/replicate"],
        ProviderKind::Cohere => &[".cohere", ".config/cohere"],
        ProviderKind::Perplexity => &[".perplexity", ".config/perplexity"],
        ProviderKind::Local => &[],
    }
}
