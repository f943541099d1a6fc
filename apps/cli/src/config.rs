//! CLI configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use hubwright_core::{BotConfig, CredentialStore, PermissionStore};

/// Load configuration.
///
/// Configuration precedence:
/// 1. Environment variables
/// 2. `--config` file, when given
/// 3. Local config file (./.hubwright.toml)
/// 4. Global config file (~/.hubwright/config.toml)
/// 5. Defaults
pub fn load_config(explicit: Option<&Path>) -> Result<BotConfig> {
    BotConfig::discover_and_load(explicit).context("Failed to load configuration")
}

/// Opens and loads the credential store named by `config`.
pub async fn open_store(config: &BotConfig) -> Result<CredentialStore> {
    let path = config
        .credentials
        .store_path
        .clone()
        .or_else(CredentialStore::default_path)
        .context("No credential store path configured and no home directory found")?;
    let store = CredentialStore::new(path, config.credentials.encryption_key.clone());
    store.initialize().await.context("Failed to open credential store")?;
    Ok(store)
}

/// The role store named by `config`.
pub fn open_roles(config: &BotConfig) -> PermissionStore {
    let path = config.permissions.path.clone().unwrap_or_else(PermissionStore::default_path);
    PermissionStore::new(path, config.permissions.default_role)
}
