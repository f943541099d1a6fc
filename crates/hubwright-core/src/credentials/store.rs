//! Encrypted, file-backed credential store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hubwright_abstraction::ProviderKind;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::cipher::SecretCipher;
use super::error::{CredentialError, CredentialResult};

/// Current version of the vault file format.
const VAULT_VERSION: &str = "1.0";

/// On-disk layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultFile {
    version: String,
    /// PBKDF2 salt (base64 encoded).
    salt: String,
    /// Provider id to encrypted record.
    entries: BTreeMap<String, String>,
}

/// Loaded vault: the salt, the cipher derived from it and the decrypted secrets.
struct Vault {
    salt: Vec<u8>,
    cipher: SecretCipher,
    secrets: BTreeMap<ProviderKind, Zeroizing<String>>,
}

/// Per-provider secrets, encrypted at rest.
///
/// The in-memory map sits behind an async `RwLock` so concurrent readers
/// never block each other. Every write goes through a single-writer mutex
/// that covers the whole read-modify-write of the backing file.
///
/// # Examples
///
/// ```no_run
/// use hubwright_abstraction::ProviderKind;
/// use hubwright_core::credentials::CredentialStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = CredentialStore::new("/tmp/keys.enc", Some("passphrase".to_string()));
/// store.initialize().await?;
/// store.set(ProviderKind::OpenAi, "sk-test").await?;
/// assert_eq!(store.get(ProviderKind::OpenAi).await.as_deref(), Some("sk-test"));
/// # Ok(())
/// # }
/// ```
pub struct CredentialStore {
    path: PathBuf,
    passphrase: Option<Zeroizing<String>>,
    vault: RwLock<Option<Vault>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("has_passphrase", &self.passphrase.is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Creates a store backed by `path`. Nothing is read until [`initialize`](Self::initialize).
    ///
    /// Without a passphrase a random per-process key is used, so anything
    /// written cannot be read back by a later process.
    pub fn new(path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: passphrase.filter(|p| !p.is_empty()).map(Zeroizing::new),
            vault: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Default vault location: `~/.hubwright/keys.enc`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".hubwright").join("keys.enc"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the vault from disk.
    ///
    /// A missing file yields an empty store. An entry that fails to decrypt
    /// is dropped and logged; the rest still load. Returns the number of
    /// secrets loaded.
    pub async fn initialize(&self) -> CredentialResult<usize> {
        let _guard = self.writer.lock().await;
        let vault = self.load().await?;
        let count = vault.secrets.len();
        *self.vault.write().await = Some(vault);
        info!(path = %self.path.display(), count, "Credential store initialized");
        Ok(count)
    }

    /// The secret for `provider`, if one is stored.
    pub async fn get(&self, provider: ProviderKind) -> Option<String> {
        let vault = self.vault.read().await;
        vault.as_ref()?.secrets.get(&provider).map(|s| s.as_str().to_string())
    }

    /// Whether a secret is stored for `provider`.
    pub async fn is_configured(&self, provider: ProviderKind) -> bool {
        let vault = self.vault.read().await;
        vault.as_ref().is_some_and(|v| v.secrets.contains_key(&provider))
    }

    /// Providers with a stored secret, in sorted order.
    pub async fn providers(&self) -> Vec<ProviderKind> {
        let vault = self.vault.read().await;
        vault.as_ref().map(|v| v.secrets.keys().copied().collect()).unwrap_or_default()
    }

    /// Stores a secret and persists immediately.
    pub async fn set(&self, provider: ProviderKind, secret: impl Into<String>) -> CredentialResult<()> {
        self.set_many(vec![(provider, secret.into())]).await
    }

    /// Removes a secret and persists. Returns whether one was present.
    pub async fn remove(&self, provider: ProviderKind) -> CredentialResult<bool> {
        let _guard = self.writer.lock().await;
        self.ensure_loaded().await?;
        let removed = {
            let mut vault = self.vault.write().await;
            vault.as_mut().is_some_and(|v| v.secrets.remove(&provider).is_some())
        };
        if removed {
            self.persist().await?;
            info!(provider = %provider, "Credential removed");
        }
        Ok(removed)
    }

    /// Stores several secrets under one write and persists once.
    pub(crate) async fn set_many(&self, updates: Vec<(ProviderKind, String)>) -> CredentialResult<()> {
        let _guard = self.writer.lock().await;
        self.ensure_loaded().await?;
        {
            let mut vault = self.vault.write().await;
            if let Some(vault) = vault.as_mut() {
                for (provider, secret) in updates {
                    debug!(provider = %provider, "Storing credential");
                    vault.secrets.insert(provider, Zeroizing::new(secret));
                }
            }
        }
        self.persist().await
    }

    /// Loads from disk if nothing is loaded yet. Caller holds the writer lock.
    async fn ensure_loaded(&self) -> CredentialResult<()> {
        if self.vault.read().await.is_some() {
            return Ok(());
        }
        let vault = self.load().await?;
        *self.vault.write().await = Some(vault);
        Ok(())
    }

    fn cipher_for(&self, salt: &[u8]) -> SecretCipher {
        match &self.passphrase {
            Some(passphrase) => SecretCipher::from_passphrase(passphrase, salt),
            None => {
                warn!(
                    "No encryption key configured; using a random key. Stored secrets will not \
                     survive a restart. Set ENCRYPTION_KEY to persist them."
                );
                SecretCipher::ephemeral()
            }
        }
    }

    async fn load(&self) -> CredentialResult<Vault> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credential vault yet, starting empty");
                let salt = SecretCipher::generate_salt();
                let cipher = self.cipher_for(&salt);
                return Ok(Vault { salt, cipher, secrets: BTreeMap::new() });
            }
            Err(e) => return Err(e.into()),
        };

        let file: VaultFile = serde_json::from_str(&contents)
            .map_err(|e| CredentialError::VaultCorruption(format!("Invalid vault format: {}", e)))?;
        if file.version != VAULT_VERSION {
            return Err(CredentialError::InvalidVaultVersion {
                expected: VAULT_VERSION.to_string(),
                found: file.version,
            });
        }
        let salt = STANDARD
            .decode(&file.salt)
            .map_err(|e| CredentialError::VaultCorruption(format!("Invalid salt: {}", e)))?;

        let cipher = self.cipher_for(&salt);
        let mut secrets = BTreeMap::new();
        for (name, record) in &file.entries {
            let Ok(provider) = name.parse::<ProviderKind>() else {
                warn!(entry = %name, "Dropping vault entry for unknown provider");
                continue;
            };
            match cipher.decrypt(record) {
                Some(secret) => {
                    secrets.insert(provider, Zeroizing::new(secret));
                }
                None => warn!(provider = %provider, "Dropping vault entry that failed to decrypt"),
            }
        }

        Ok(Vault { salt, cipher, secrets })
    }

    /// Encrypts every secret with a fresh nonce and atomically replaces the file.
    async fn persist(&self) -> CredentialResult<()> {
        let file = {
            let vault = self.vault.read().await;
            let Some(vault) = vault.as_ref() else {
                return Ok(());
            };
            let mut entries = BTreeMap::new();
            for (provider, secret) in &vault.secrets {
                entries.insert(provider.as_str().to_string(), vault.cipher.encrypt(secret)?);
            }
            VaultFile {
                version: VAULT_VERSION.to_string(),
                salt: STANDARD.encode(&vault.salt),
                entries,
            }
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        ensure_private_dir(&dir).await?;

        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        set_mode(&tmp, 0o600).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), entries = file.entries.len(), "Credential vault saved");
        Ok(())
    }
}

async fn ensure_private_dir(dir: &Path) -> CredentialResult<()> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        fs::create_dir_all(dir).await?;
        set_mode(dir, 0o700).await?;
    }
    Ok(())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> CredentialResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> CredentialResult<()> {
    Ok(())
}
