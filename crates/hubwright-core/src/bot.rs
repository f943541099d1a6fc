//! Process-wide wiring and repository event handling.
//!
//! [`Bot`] owns the credential store, model catalog, workflow engine and
//! command router. It is assembled once at startup and passed by handle;
//! there are no global singletons.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hubwright_abstraction::ProviderKind;
use hubwright_models::ProviderFactory;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::{ModelCatalog, ScanReport, scan_directory};
use crate::commands::{
    BotServices, CommandRouter, RepoRef, RequestContext, register_builtins, render_workflow_result,
};
use crate::config::{BotConfig, ConfigError};
use crate::credentials::{CredentialStore, DiscoveryContext};
use crate::error::Result;
use crate::permissions::{Action, PermissionStore};
use crate::preferences::PreferenceStore;
use crate::scm::{GitHubClient, OfflineSourceControl, SourceControl};
use crate::workflow::{AdapterResolver, Context, WorkflowEngine, WorkflowExecutionResult, WorkflowRegistry};

/// Who triggered an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub login: String,
    #[serde(default)]
    pub is_bot: bool,
}

impl Actor {
    pub fn user(login: impl Into<String>) -> Self {
        Self { login: login.into(), is_bot: false }
    }
}

/// Repository activity the bot reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RepositoryEvent {
    IssueOpened { owner: String, repo: String, number: u64, title: String, body: String, sender: Actor },
    IssueComment { owner: String, repo: String, number: u64, body: String, sender: Actor },
    PullRequestOpened { owner: String, repo: String, number: u64, title: String, sender: Actor },
}

impl RepositoryEvent {
    /// Maps a GitHub webhook (`X-GitHub-Event` name plus JSON payload).
    /// Unsupported events and actions yield `None`.
    pub fn from_webhook(event: &str, payload: &Value) -> Option<Self> {
        let owner = payload["repository"]["owner"]["login"].as_str()?.to_string();
        let repo = payload["repository"]["name"].as_str()?.to_string();
        let sender = Actor {
            login: payload["sender"]["login"].as_str()?.to_string(),
            is_bot: payload["sender"]["type"].as_str() == Some("Bot"),
        };
        let text = |v: &Value| v.as_str().unwrap_or_default().to_string();

        match (event, payload["action"].as_str()?) {
            ("issues", "opened") => Some(Self::IssueOpened {
                owner,
                repo,
                number: payload["issue"]["number"].as_u64()?,
                title: text(&payload["issue"]["title"]),
                body: text(&payload["issue"]["body"]),
                sender,
            }),
            ("issue_comment", "created") => Some(Self::IssueComment {
                owner,
                repo,
                number: payload["issue"]["number"].as_u64()?,
                body: text(&payload["comment"]["body"]),
                sender,
            }),
            ("pull_request", "opened") => Some(Self::PullRequestOpened {
                owner,
                repo,
                number: payload["pull_request"]["number"].as_u64()?,
                title: text(&payload["pull_request"]["title"]),
                sender,
            }),
            _ => None,
        }
    }

    fn parts(&self) -> (&str, &str, u64, &Actor) {
        match self {
            Self::IssueOpened { owner, repo, number, sender, .. }
            | Self::IssueComment { owner, repo, number, sender, .. }
            | Self::PullRequestOpened { owner, repo, number, sender, .. } => {
                (owner.as_str(), repo.as_str(), *number, sender)
            }
        }
    }
}

/// The assembled bot.
pub struct Bot {
    config: BotConfig,
    credentials: Arc<CredentialStore>,
    catalog: Arc<RwLock<ModelCatalog>>,
    factory: ProviderFactory,
    engine: WorkflowEngine,
    router: CommandRouter,
    scm: Arc<dyn SourceControl>,
    preferences: Arc<PreferenceStore>,
    permissions: Arc<PermissionStore>,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("credentials", &self.credentials)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Bot {
    /// Assembles the bot from configuration, the process environment and
    /// the configured source-control endpoint.
    ///
    /// Without a source-control token the bot runs against an offline
    /// endpoint that records writes.
    pub async fn bootstrap(config: BotConfig) -> Result<Self> {
        let scm: Arc<dyn SourceControl> = match &config.source_control.token {
            Some(token) => Arc::new(GitHubClient::new(
                config.source_control.api_base.clone(),
                Some(token.clone()),
                Duration::from_secs(config.source_control.request_timeout_secs),
            )?),
            None => {
                warn!("No source control token configured, using offline mode");
                Arc::new(OfflineSourceControl::new())
            }
        };
        Self::assemble(config, scm, &DiscoveryContext::from_process(), None).await
    }

    /// Assembles the bot from explicit parts. `resolver` defaults to the
    /// provider factory built from `config`.
    pub async fn assemble(
        config: BotConfig,
        scm: Arc<dyn SourceControl>,
        discovery: &DiscoveryContext,
        resolver: Option<Arc<dyn AdapterResolver>>,
    ) -> Result<Self> {
        config.validate()?;

        let store_path = config
            .credentials
            .store_path
            .clone()
            .or_else(CredentialStore::default_path)
            .ok_or_else(|| ConfigError::InvalidValue("no credential store path and no home directory".into()))?;
        let credentials = Arc::new(CredentialStore::new(store_path, config.credentials.encryption_key.clone()));
        let loaded = credentials.initialize().await?;
        let remote: Vec<ProviderKind> = ProviderKind::remote().collect();
        let discovered = credentials.discover(&remote, discovery).await;
        info!(loaded, discovered = discovered.len(), "Credentials ready");

        let catalog = Arc::new(RwLock::new(Self::build_catalog(&config).await));

        let factory = ProviderFactory::new(config.to_factory_config())?;
        let resolver = resolver.unwrap_or_else(|| Arc::new(factory.clone()) as Arc<dyn AdapterResolver>);
        let registry = Arc::new(WorkflowRegistry::builtin(scm.clone()));
        let engine = WorkflowEngine::new(catalog.clone(), credentials.clone(), resolver.clone(), registry);

        let preferences_dir = config.preferences_dir.clone().unwrap_or_else(PreferenceStore::default_dir);
        let preferences = Arc::new(PreferenceStore::new(preferences_dir));
        let roles_path = config.permissions.path.clone().unwrap_or_else(PermissionStore::default_path);
        let permissions = Arc::new(PermissionStore::new(roles_path, config.permissions.default_role));

        let mut router = CommandRouter::new()
            .with_sigil(config.router.sigil)
            .with_threshold(config.router.intent_threshold);
        let services = BotServices {
            scm: scm.clone(),
            engine: engine.clone(),
            catalog: catalog.clone(),
            credentials: credentials.clone(),
            resolver,
            preferences: preferences.clone(),
        };
        register_builtins(&mut router, &services);

        Ok(Self { config, credentials, catalog, factory, engine, router, scm, preferences, permissions })
    }

    /// The built-in catalog with the configured default, extra models and
    /// local scan applied.
    pub async fn build_catalog(config: &BotConfig) -> ModelCatalog {
        let mut catalog = ModelCatalog::builtin().with_default(config.models.default_model.clone());
        for model in &config.models.extra {
            if let Err(e) = catalog.register(model.clone()) {
                warn!(error = %e, "Skipping configured model");
            }
        }
        if let Some(dir) = &config.models.local_dir {
            catalog.scan_local(dir).await;
        }
        if catalog.default_model().is_none() {
            warn!(model = %catalog.default_model_name(), "Default model is not in the catalog");
        }
        catalog
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn catalog(&self) -> &Arc<RwLock<ModelCatalog>> {
        &self.catalog
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn preferences(&self) -> &Arc<PreferenceStore> {
        &self.preferences
    }

    pub fn permissions(&self) -> &Arc<PermissionStore> {
        &self.permissions
    }

    /// Scans another local model directory into the shared catalog.
    ///
    /// The directory is read before the catalog is locked for writing.
    pub async fn scan_models(&self, dir: PathBuf) -> ScanReport {
        let (models, report) = scan_directory(&dir).await;
        self.catalog.write().await.register_scanned(&dir, models, report)
    }

    /// Routes `text` and formats the reply with the sender's preferences.
    pub async fn process(&self, text: &str, context: RequestContext) -> String {
        let sender = context.sender.clone();
        let reply = self.router.process(text, context).await;
        self.preferences.format_response(&sender, &reply).await
    }

    pub async fn run_workflow(
        &self,
        name: &str,
        context: Context,
        preference: Option<&str>,
    ) -> WorkflowExecutionResult {
        self.engine.run(name, context, preference).await
    }

    fn is_own_or_bot(&self, actor: &Actor) -> bool {
        actor.is_bot
            || actor.login.ends_with("[bot]")
            || self
                .config
                .source_control
                .bot_login
                .as_deref()
                .is_some_and(|login| login.eq_ignore_ascii_case(&actor.login))
    }

    /// Reacts to one event and posts the reply as a comment.
    ///
    /// Events from bot accounts and from senders whose role lacks
    /// [`Action::Comment`] are ignored. Returns the posted reply, or `None`
    /// when the event was ignored.
    ///
    /// # Errors
    /// Posting the comment failed.
    pub async fn handle_event(&self, event: &RepositoryEvent) -> Result<Option<String>> {
        let (owner, repo, number, sender) = event.parts();
        if self.is_own_or_bot(sender) {
            debug!(sender = %sender.login, "Ignoring bot-authored event");
            return Ok(None);
        }
        if !self.permissions.has_permission(&sender.login, Action::Comment).await {
            let role = self.permissions.role_of(&sender.login).await;
            info!(sender = %sender.login, role = %role, "Sender lacks comment permission");
            return Ok(None);
        }

        let context = RequestContext::new(sender.login.clone())
            .in_repo(RepoRef::new(owner, repo))
            .on_issue(number);

        let reply = match event {
            RepositoryEvent::IssueOpened { title, body, .. } => {
                let text = if body.trim_start().starts_with(self.router.sigil()) {
                    body.clone()
                } else {
                    format!("{}\n{}", title, body).trim().to_string()
                };
                self.process(&text, context).await
            }
            RepositoryEvent::IssueComment { body, .. } => self.process(body, context).await,
            RepositoryEvent::PullRequestOpened { .. } => {
                let workflow_context = match json!({ "owner": owner, "repo": repo, "pull_number": number }) {
                    Value::Object(map) => map,
                    _ => Context::new(),
                };
                let result = self.engine.run("pr-summary", workflow_context, None).await;
                render_workflow_result(&result)
            }
        };

        info!(owner = %owner, repo = %repo, number, "Posting reply");
        self.scm.comment(owner, repo, number, &reply).await?;
        Ok(Some(reply))
    }

    /// Cancels in-flight polling requests.
    pub fn shutdown(&self) {
        self.factory.shutdown();
    }
}
