//! Bot configuration.
//!
//! Loaded from TOML, then overridden from the environment. Search order:
//! 1. An explicit path (`--config`)
//! 2. `./.hubwright.toml`
//! 3. `~/.hubwright/config.toml`
//!
//! No file at all means defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hubwright_abstraction::ProviderKind;
use hubwright_models::{FactoryConfig, PollPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{DEFAULT_MODEL, ModelDescriptor};
use crate::commands::{DEFAULT_INTENT_THRESHOLD, DEFAULT_SIGIL};
use crate::permissions::Role;
use crate::scm::GITHUB_API_BASE;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Read(String),

    #[error("Failed to parse configuration file: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `[credentials]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Vault path; `~/.hubwright/keys.enc` when unset.
    pub store_path: Option<PathBuf>,
    /// Passphrase for the vault key.
    pub encryption_key: Option<String>,
}

/// `[models]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub default_model: String,
    /// Directory of local model subdirectories.
    pub local_dir: Option<PathBuf>,
    /// Additional descriptors registered at startup.
    pub extra: Vec<ModelDescriptor>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self { default_model: DEFAULT_MODEL.to_string(), local_dir: None, extra: Vec::new() }
    }
}

/// `[router]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub sigil: char,
    /// Intent similarity must exceed this to match.
    pub intent_threshold: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { sigil: DEFAULT_SIGIL, intent_threshold: DEFAULT_INTENT_THRESHOLD }
    }
}

/// `[providers]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    /// Endpoint overrides keyed by provider name.
    pub base_urls: BTreeMap<String, String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let poll = PollPolicy::default();
        Self {
            request_timeout_secs: 60,
            poll_interval_ms: u64::try_from(poll.interval.as_millis()).unwrap_or(1000),
            max_poll_attempts: poll.max_attempts,
            base_urls: BTreeMap::new(),
        }
    }
}

/// `[source_control]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceControlConfig {
    pub api_base: String,
    pub token: Option<String>,
    /// The bot's own login; its comments are ignored.
    pub bot_login: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for SourceControlConfig {
    fn default() -> Self {
        Self {
            api_base: GITHUB_API_BASE.to_string(),
            token: None,
            bot_login: None,
            request_timeout_secs: 30,
        }
    }
}

/// `[permissions]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Role file; `~/.hubwright/roles.json` when unset.
    pub path: Option<PathBuf>,
    /// Role of users with no assigned role.
    pub default_role: Role,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self { path: None, default_role: Role::User }
    }
}

/// Complete bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub credentials: CredentialsConfig,
    pub models: ModelsConfig,
    pub router: RouterConfig,
    pub providers: ProvidersConfig,
    pub source_control: SourceControlConfig,
    pub permissions: PermissionsConfig,
    /// Directory for per-user preference files.
    pub preferences_dir: Option<PathBuf>,
}

impl BotConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// [`ConfigError::NotFound`], [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Writes configuration as TOML.
    ///
    /// # Errors
    /// Serialization or I/O failures.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Read(format!("Failed to create directory: {}", e)))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Read(format!("Failed to write file: {}", e)))
    }

    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".hubwright.toml")
    }

    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".hubwright").join("config.toml"))
    }

    /// Candidate files in search order.
    pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = explicit.map(Path::to_path_buf).into_iter().collect();
        paths.push(Self::default_local_path());
        paths.extend(Self::default_global_path());
        paths
    }

    /// Loads the first existing file in search order and applies process
    /// environment overrides.
    ///
    /// # Errors
    /// An explicit path that does not exist, or any file that fails to parse.
    pub fn discover_and_load(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit
            && !path.exists()
        {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let mut config = Self::default();
        for path in Self::search_paths(explicit) {
            if path.exists() {
                debug!(path = %path.display(), "Loading configuration");
                config = Self::load_from_file(&path)?;
                break;
            }
        }
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overrides fields from environment variables. Blank values are ignored.
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] when `HUBWRIGHT_INTENT_THRESHOLD` is not a
    /// number or `HUBWRIGHT_DEFAULT_ROLE` is not a role.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("KEY_STORE_PATH") {
            self.credentials.store_path = Some(PathBuf::from(path));
        }
        if let Some(key) = var("ENCRYPTION_KEY") {
            self.credentials.encryption_key = Some(key);
        }
        if let Some(model) = var("HUBWRIGHT_DEFAULT_MODEL") {
            self.models.default_model = model;
        }
        if let Some(dir) = var("HUBWRIGHT_MODELS_DIR") {
            self.models.local_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = var("HUBWRIGHT_INTENT_THRESHOLD") {
            self.router.intent_threshold = raw.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("HUBWRIGHT_INTENT_THRESHOLD={}", raw))
            })?;
        }
        if let Some(raw) = var("HUBWRIGHT_DEFAULT_ROLE") {
            self.permissions.default_role =
                raw.parse::<Role>().map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }
        if let Some(token) = var("GITHUB_TOKEN") {
            self.source_control.token = Some(token);
        }
        if let Some(url) = var("GITHUB_API_URL") {
            self.source_control.api_base = url;
        }
        self.validate()
    }

    /// # Errors
    /// [`ConfigError::InvalidValue`] for an out-of-range threshold or a
    /// zero poll interval.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.router.intent_threshold) {
            return Err(ConfigError::InvalidValue(format!(
                "router.intent_threshold must be within [0, 1], got {}",
                self.router.intent_threshold
            )));
        }
        if self.providers.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("providers.poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Adapter factory settings. Unknown provider names in `base_urls` are
    /// skipped with a warning.
    pub fn to_factory_config(&self) -> FactoryConfig {
        let mut factory = FactoryConfig {
            request_timeout: Duration::from_secs(self.providers.request_timeout_secs),
            ..FactoryConfig::default()
        }
        .with_poll_policy(PollPolicy {
            interval: Duration::from_millis(self.providers.poll_interval_ms),
            max_attempts: self.providers.max_poll_attempts,
        });

        for (name, url) in &self.providers.base_urls {
            match name.parse::<ProviderKind>() {
                Ok(provider) => factory = factory.with_base_url(provider, url.clone()),
                Err(e) => warn!(provider = %name, error = %e, "Ignoring base URL for unknown provider"),
            }
        }
        factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[credentials]
store_path = "/tmp/keys.enc"

[models]
default_model = "claude-3-sonnet"

[[models.extra]]
name = "tiny"
provider = "local"
capabilities = ["chat"]
context_window = 2048
performance = 0.3
local = true

[router]
sigil = "!"
intent_threshold = 0.5

[providers]
poll_interval_ms = 250

[providers.base_urls]
openai = "http://localhost:9000/v1"
bogus = "http://nowhere"

[source_control]
bot_login = "hubwright-bot"

[permissions]
path = "/srv/roles.json"
default_role = "anonymous"
"#,
        )
        .unwrap();

        let config = BotConfig::load_from_file(&path).unwrap();
        assert_eq!(config.credentials.store_path, Some(PathBuf::from("/tmp/keys.enc")));
        assert_eq!(config.models.default_model, "claude-3-sonnet");
        assert_eq!(config.models.extra[0].name, "tiny");
        assert_eq!(config.router.sigil, '!');
        assert!((config.router.intent_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.source_control.api_base, GITHUB_API_BASE);
        assert_eq!(config.source_control.bot_login.as_deref(), Some("hubwright-bot"));
        assert_eq!(config.permissions.path, Some(PathBuf::from("/srv/roles.json")));
        assert_eq!(config.permissions.default_role, Role::Anonymous);

        let factory = config.to_factory_config();
        assert_eq!(factory.base_url(ProviderKind::OpenAi), "http://localhost:9000/v1");
        assert_eq!(factory.poll.interval, Duration::from_millis(250));
        assert_eq!(factory.poll.max_attempts, 600);
    }

    #[test]
    fn test_missing_file() {
        let err = BotConfig::load_from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert!(BotConfig::discover_and_load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    #[test]
    fn test_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[router\nsigil = ").unwrap();
        assert!(matches!(BotConfig::load_from_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("KEY_STORE_PATH", "/vault/keys.enc"),
            ("ENCRYPTION_KEY", "passphrase"),
            ("HUBWRIGHT_DEFAULT_MODEL", "gpt-4o"),
            ("HUBWRIGHT_INTENT_THRESHOLD", "0.45"),
            ("GITHUB_TOKEN", "   "),
            ("GITHUB_API_URL", "http://ghe.local/api/v3"),
            ("HUBWRIGHT_DEFAULT_ROLE", "Contributor"),
        ]);
        let mut config = BotConfig::default();
        config.apply_env(|name| env.get(name).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.credentials.store_path, Some(PathBuf::from("/vault/keys.enc")));
        assert_eq!(config.credentials.encryption_key.as_deref(), Some("passphrase"));
        assert_eq!(config.models.default_model, "gpt-4o");
        assert!((config.router.intent_threshold - 0.45).abs() < f64::EPSILON);
        assert_eq!(config.source_control.token, None);
        assert_eq!(config.source_control.api_base, "http://ghe.local/api/v3");
        assert_eq!(config.permissions.default_role, Role::Contributor);

        let mut config = BotConfig::default();
        assert_eq!(config.permissions.default_role, Role::User);
        assert!(config.apply_env(|name| (name == "HUBWRIGHT_DEFAULT_ROLE").then(|| "root".to_string())).is_err());
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = BotConfig::default();
        assert!(matches!(
            config.apply_env(|name| (name == "HUBWRIGHT_INTENT_THRESHOLD").then(|| "high".to_string())),
            Err(ConfigError::InvalidValue(_))
        ));
        config.router.intent_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let mut config = BotConfig::default();
        config.models.default_model = "mistral-7b".into();
        config.save_to_file(&path).unwrap();
        assert_eq!(BotConfig::load_from_file(&path).unwrap().models.default_model, "mistral-7b");
    }
}
