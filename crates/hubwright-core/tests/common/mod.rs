//! Shared helpers for hubwright-core integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use hubwright_abstraction::{ProviderAdapter, ProviderError};
use hubwright_core::workflow::{AdapterResolver, Context};
use hubwright_core::{Bot, BotConfig, DiscoveryContext, ModelDescriptor, SourceControl};
use hubwright_models::MockAdapter;
use serde_json::Value;

pub const PASSPHRASE: &str = "integration-test-passphrase";

/// Hands out one shared [`MockAdapter`] and records what was resolved.
pub struct MockResolver {
    pub adapter: Arc<MockAdapter>,
    resolved: Mutex<Vec<(String, Option<String>)>>,
}

impl MockResolver {
    pub fn new(adapter: MockAdapter) -> Arc<Self> {
        Arc::new(Self { adapter: Arc::new(adapter), resolved: Mutex::new(Vec::new()) })
    }

    /// `(model name, secret)` for every resolution so far.
    pub fn resolved(&self) -> Vec<(String, Option<String>)> {
        self.resolved.lock().unwrap().clone()
    }
}

impl AdapterResolver for MockResolver {
    fn resolve(
        &self,
        model: &ModelDescriptor,
        secret: Option<&str>,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.resolved.lock().unwrap().push((model.name.clone(), secret.map(str::to_string)));
        Ok(self.adapter.clone() as Arc<dyn ProviderAdapter>)
    }
}

/// Configuration rooted entirely inside `dir`.
pub fn test_config(dir: &Path) -> BotConfig {
    let mut config = BotConfig::default();
    config.credentials.store_path = Some(dir.join("keys.enc"));
    config.credentials.encryption_key = Some(PASSPHRASE.to_string());
    config.preferences_dir = Some(dir.join("preferences"));
    config.permissions.path = Some(dir.join("roles.json"));
    config
}

/// A discovery context with no variables and an empty home.
pub fn empty_discovery(dir: &Path) -> DiscoveryContext {
    DiscoveryContext::new(Some(dir.join("home")))
}

pub async fn assemble_bot(
    dir: &Path,
    scm: Arc<dyn SourceControl>,
    discovery: &DiscoveryContext,
    resolver: Arc<MockResolver>,
) -> Bot {
    Bot::assemble(test_config(dir), scm, discovery, Some(resolver)).await.unwrap()
}

/// Builds a workflow context from a JSON object literal.
pub fn context(value: Value) -> Context {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}
