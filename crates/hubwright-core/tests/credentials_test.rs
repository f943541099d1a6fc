//! Credential discovery against a sandboxed home directory.

mod common;

use std::sync::Arc;

use hubwright_abstraction::ProviderKind;
use hubwright_core::{CredentialStore, DiscoveryContext, OfflineSourceControl};
use hubwright_models::MockAdapter;
use tempfile::TempDir;

use common::{MockResolver, PASSPHRASE, assemble_bot};

fn sandbox() -> (TempDir, DiscoveryContext) {
    let dir = TempDir::new().unwrap();
    let home = dir.path().join("home");
    std::fs::create_dir_all(home.join(".config")).unwrap();
    std::fs::write(home.join(".anthropic.json"), r#"{"apiKey": "sk-ant-file"}"#).unwrap();
    std::fs::write(home.join(".config/cohere"), "token: co-yaml").unwrap();
    let ctx = DiscoveryContext::new(Some(home)).with_var("OPENAI_API_KEY", "sk-openai-env");
    (dir, ctx)
}

#[tokio::test]
async fn test_discover_is_idempotent_and_persisted() {
    let (dir, ctx) = sandbox();
    let path = dir.path().join("keys.enc");
    let store = CredentialStore::new(&path, Some(PASSPHRASE.into()));
    store.initialize().await.unwrap();

    let remote: Vec<ProviderKind> = ProviderKind::remote().collect();
    let mut first = store.discover(&remote, &ctx).await;
    first.sort();
    let mut expected = vec![ProviderKind::OpenAi, ProviderKind::Anthropic, ProviderKind::Cohere];
    expected.sort();
    assert_eq!(first, expected);

    let second = store.discover(&remote, &ctx).await;
    assert!(second.is_empty());

    let reopened = CredentialStore::new(&path, Some(PASSPHRASE.into()));
    assert_eq!(reopened.initialize().await.unwrap(), 3);
    assert_eq!(reopened.get(ProviderKind::OpenAi).await.as_deref(), Some("sk-openai-env"));
    assert_eq!(reopened.get(ProviderKind::Anthropic).await.as_deref(), Some("sk-ant-file"));
    assert_eq!(reopened.get(ProviderKind::Cohere).await.as_deref(), Some("co-yaml"));
    assert!(!reopened.is_configured(ProviderKind::HuggingFace).await);
}

#[tokio::test]
async fn test_discover_never_overwrites_stored_secret() {
    let (dir, ctx) = sandbox();
    let store = CredentialStore::new(dir.path().join("keys.enc"), Some(PASSPHRASE.into()));
    store.initialize().await.unwrap();
    store.set(ProviderKind::OpenAi, "sk-user-set").await.unwrap();

    let found = store.discover(&[ProviderKind::OpenAi, ProviderKind::Local], &ctx).await;

    assert!(found.is_empty());
    assert_eq!(store.get(ProviderKind::OpenAi).await.as_deref(), Some("sk-user-set"));
    assert!(!store.is_configured(ProviderKind::Local).await);
}

#[tokio::test]
async fn test_assemble_runs_discovery() {
    let (dir, ctx) = sandbox();
    let resolver = MockResolver::new(MockAdapter::new(ProviderKind::OpenAi, "gpt-4o"));

    let bot = assemble_bot(dir.path(), Arc::new(OfflineSourceControl::new()), &ctx, resolver).await;

    let providers = bot.credentials().providers().await;
    assert!(providers.contains(&ProviderKind::OpenAi));
    assert!(providers.contains(&ProviderKind::Anthropic));
    assert!(dir.path().join("keys.enc").is_file());
}
