//! Secret discovery from the environment and local config files.
//!
//! For every provider without a stored secret, look in order: named
//! environment variables, then known config files (parsed as JSON, then
//! YAML, then a `key/token/secret = value` regex). The first hit wins.
//! Newly found secrets are persisted with a single write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use hubwright_abstraction::ProviderKind;
use regex::Regex;
use tokio::fs;
use tracing::{debug, info, warn};

use super::error::DiscoveryError;
use super::providers::{config_file_paths, env_var_names};
use super::store::CredentialStore;

/// Field names checked in structured config files, in order.
const KEY_FIELDS: [&str; 4] = ["api_key", "apiKey", "key", "token"];

static KEY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:api[-_]?key|token|secret)[\s=:"']+([A-Za-z0-9_\-]+)"#).ok()
});

/// Inputs to discovery: an environment snapshot and a home directory.
///
/// Tests build one explicitly; production code uses [`DiscoveryContext::from_process`].
#[derive(Debug, Clone, Default)]
pub struct DiscoveryContext {
    env: HashMap<String, String>,
    home: Option<PathBuf>,
}

impl DiscoveryContext {
    pub fn new(home: Option<PathBuf>) -> Self {
        Self { env: HashMap::new(), home }
    }

    /// Snapshot of the current process environment and home directory.
    pub fn from_process() -> Self {
        Self { env: std::env::vars().collect(), home: dirs::home_dir() }
    }

    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    async fn find_secret(&self, provider: ProviderKind) -> Option<(String, String)> {
        for name in env_var_names(provider) {
            if let Some(value) = self.var(name) {
                return Some((value.trim().to_string(), format!("env:{}", name)));
            }
        }

        let home = self.home.as_deref()?;
        for relative in config_file_paths(provider) {
            let path = home.join(relative);
            if !fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                continue;
            }
            match read_secret_file(&path).await {
                Ok(secret) => return Some((secret, path.display().to_string())),
                Err(e) => debug!(provider = %provider, error = %e, "Config file lookup failed"),
            }
        }
        None
    }
}

async fn read_secret_file(path: &Path) -> Result<String, DiscoveryError> {
    let contents = fs::read_to_string(path).await.map_err(|source| DiscoveryError::Read {
        path: path.display().to_string(),
        source,
    })?;
    extract_secret(&contents).ok_or_else(|| DiscoveryError::NoSecret(path.display().to_string()))
}

/// Pulls a secret out of a config file body: JSON, then YAML, then regex.
pub fn extract_secret(contents: &str) -> Option<String> {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(contents) {
        if let Some(secret) = KEY_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(serde_json::Value::as_str))
            .filter(|s| !s.trim().is_empty())
        {
            return Some(secret.trim().to_string());
        }
    }

    if let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str::<serde_yaml::Value>(contents) {
        if let Some(secret) = KEY_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(serde_yaml::Value::as_str))
            .filter(|s| !s.trim().is_empty())
        {
            return Some(secret.trim().to_string());
        }
    }

    KEY_PATTERN
        .as_ref()?
        .captures(contents)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl CredentialStore {
    /// Fills in missing secrets for `providers` from `ctx`, then persists.
    ///
    /// Providers that already have a secret are skipped. Failures are logged
    /// and never propagated. Returns the providers newly discovered.
    pub async fn discover(
        &self,
        providers: &[ProviderKind],
        ctx: &DiscoveryContext,
    ) -> Vec<ProviderKind> {
        let mut found = Vec::new();
        for &provider in providers {
            if !provider.requires_secret() || self.is_configured(provider).await {
                continue;
            }
            match ctx.find_secret(provider).await {
                Some((secret, source)) => {
                    info!(provider = %provider, source = %source, "Discovered credential");
                    found.push((provider, secret));
                }
                None => debug!(provider = %provider, "No credential found"),
            }
        }

        let discovered: Vec<ProviderKind> = found.iter().map(|(p, _)| *p).collect();
        if found.is_empty() {
            return discovered;
        }
        if let Err(e) = self.set_many(found).await {
            warn!(error = %e, "Failed to persist discovered credentials");
        }
        discovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_field_order() {
        assert_eq!(extract_secret(r#"{"token":"t","api_key":"a"}"#).as_deref(), Some("a"));
        assert_eq!(extract_secret(r#"{"apiKey":"camel"}"#).as_deref(), Some("camel"));
        assert_eq!(extract_secret(r#"{"token":"only-token"}"#).as_deref(), Some("only-token"));
    }

    #[test]
    fn test_extract_yaml() {
        let yaml = "provider: openai\napi_key: sk-yaml-123\n";
        assert_eq!(extract_secret(yaml).as_deref(), Some("sk-yaml-123"));
    }

    #[test]
    fn test_extract_regex_fallback() {
        assert_eq!(extract_secret("API_KEY=sk-env-style").as_deref(), Some("sk-env-style"));
        assert_eq!(extract_secret("export secret: 'abc_DEF-9'").as_deref(), Some("abc_DEF-9"));
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_secret(""), None);
        assert_eq!(extract_secret(r#"{"name":"x"}"#), None);
        assert_eq!(extract_secret("just some text"), None);
    }

    #[tokio::test]
    async fn test_env_beats_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(".openai"), "api_key = from-file").unwrap();
        let ctx = DiscoveryContext::new(Some(dir.path().to_path_buf()))
            .with_var("OPENAI_API_KEY", "from-env");

        let (secret, source) = ctx.find_secret(ProviderKind::OpenAi).await.unwrap();
        assert_eq!(secret, "from-env");
        assert_eq!(source, "env:OPENAI_API_KEY");
    }

    #[tokio::test]
    async fn test_file_order_first_hit_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(".openai.json"), r#"{"api_key":"second"}"#).unwrap();
        std::fs::create_dir_all(dir.path().join(".config")).unwrap();
        std::fs::write(dir.path().join(".config/openai"), "token: third").unwrap();
        let ctx = DiscoveryContext::new(Some(dir.path().to_path_buf()));

        assert_eq!(ctx.find_secret(ProviderKind::OpenAi).await.unwrap().0, "second");
    }

    #[tokio::test]
    async fn test_directories_and_files_without_secrets_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".openai")).unwrap();
        std::fs::write(dir.path().join(".openai.json"), "nothing useful").unwrap();
        std::fs::create_dir_all(dir.path().join(".config")).unwrap();
        std::fs::write(dir.path().join(".config/openai"), "token: from-last-file").unwrap();
        let ctx = DiscoveryContext::new(Some(dir.path().to_path_buf()));

        let (secret, source) = ctx.find_secret(ProviderKind::OpenAi).await.unwrap();
        assert_eq!(secret, "from-last-file");
        assert!(source.ends_with("openai"));
    }

    #[tokio::test]
    async fn test_blank_env_is_ignored() {
        let ctx = DiscoveryContext::new(None).with_var("COHERE_API_KEY", "   ");
        assert!(ctx.find_secret(ProviderKind::Cohere).await.is_none());
    }
}
