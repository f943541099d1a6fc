//! Hubwright Core - repository chat bot backend.
//!
//! This crate provides:
//! - Encrypted per-provider credential storage with discovery
//! - A model catalog with capability-based selection
//! - Multi-step workflows over a model and the source-control API
//! - Command, intent and fallback routing for chat input
//! - Role-based permissions for replying to repository events
//!
//! # Example
//!
//! ```rust,no_run
//! use hubwright_core::{Bot, BotConfig, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> hubwright_core::Result<()> {
//!     let bot = Bot::bootstrap(BotConfig::discover_and_load(None)?).await?;
//!     println!("{}", bot.process("/help", RequestContext::new("octocat")).await);
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod permissions;
pub mod preferences;
pub mod scm;
pub mod workflow;

pub use bot::{Actor, Bot, RepositoryEvent};
pub use catalog::{Capability, ModelCatalog, ModelDescriptor, ModelSelector};
pub use commands::{CommandRouter, RepoRef, RequestContext};
pub use config::{BotConfig, ConfigError};
pub use credentials::{CredentialError, CredentialStore, DiscoveryContext};
pub use error::{BotError, ParseError, Result};
pub use permissions::{Action, PermissionStore, Role};
pub use preferences::{PreferenceStore, parse_preference_update};
pub use scm::{GitHubClient, OfflineSourceControl, ScmError, SourceControl};
pub use workflow::{
    WorkflowDefinition, WorkflowEngine, WorkflowError, WorkflowExecutionResult, WorkflowRegistry,
    WorkflowStatus,
};
