//! Role-based permissions for acting on repository events.
//!
//! One JSON file holds the action table and the assigned roles:
//!
//! ```json
//! {
//!   "permissions": { "comment": ["user", "contributor", "maintainer", "admin", "owner"] },
//!   "userRoles": { "octocat": "maintainer" }
//! }
//! ```
//!
//! A missing file, or a file without `permissions`, uses the default table.
//! Users without an assigned role get the store's default role.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PermissionResult<T> = std::result::Result<T, PermissionError>;

/// Roles from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Anonymous,
    User,
    Contributor,
    Maintainer,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 6] =
        [Role::Anonymous, Role::User, Role::Contributor, Role::Maintainer, Role::Admin, Role::Owner];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::User => "user",
            Self::Contributor => "contributor",
            Self::Maintainer => "maintainer",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// This role and every more trusted one.
    fn and_above(self) -> BTreeSet<Role> {
        Self::ALL.into_iter().filter(|r| *r >= self).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognized role name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

/// Actions a role may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Comment,
    CreateIssue,
    CloseIssue,
    CreatePr,
    MergePr,
    ManageRepo,
}

/// The default action table: each action is open to a role and everyone above it.
pub fn default_permissions() -> BTreeMap<Action, BTreeSet<Role>> {
    [
        (Action::Read, Role::Anonymous),
        (Action::Comment, Role::User),
        (Action::CreateIssue, Role::User),
        (Action::CloseIssue, Role::Contributor),
        (Action::CreatePr, Role::Contributor),
        (Action::MergePr, Role::Maintainer),
        (Action::ManageRepo, Role::Admin),
    ]
    .into_iter()
    .map(|(action, lowest)| (action, lowest.and_above()))
    .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionFile {
    #[serde(default)]
    permissions: Option<BTreeMap<Action, BTreeSet<Role>>>,
    #[serde(default)]
    user_roles: BTreeMap<String, Role>,
}

#[derive(Debug, Clone)]
struct Table {
    permissions: BTreeMap<Action, BTreeSet<Role>>,
    user_roles: BTreeMap<String, Role>,
}

impl From<PermissionFile> for Table {
    fn from(file: PermissionFile) -> Self {
        Self {
            permissions: file.permissions.unwrap_or_else(default_permissions),
            user_roles: file
                .user_roles
                .into_iter()
                .map(|(login, role)| (login.to_lowercase(), role))
                .collect(),
        }
    }
}

/// File-backed role assignments and action table.
///
/// Logins are matched case-insensitively.
#[derive(Debug)]
pub struct PermissionStore {
    path: PathBuf,
    default_role: Role,
    table: RwLock<Option<Table>>,
    writer: Mutex<()>,
}

impl PermissionStore {
    pub fn new(path: impl Into<PathBuf>, default_role: Role) -> Self {
        Self { path: path.into(), default_role, table: RwLock::new(None), writer: Mutex::new(()) }
    }

    /// `~/.hubwright/roles.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".hubwright").join("roles.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_role(&self) -> Role {
        self.default_role
    }

    async fn read_file(&self) -> Table {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str::<PermissionFile>(&raw) {
                Ok(file) => file.into(),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Ignoring unreadable role file");
                    PermissionFile::default().into()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Could not read role file");
                }
                PermissionFile::default().into()
            }
        }
    }

    async fn table(&self) -> Table {
        if let Some(table) = self.table.read().await.as_ref() {
            return table.clone();
        }
        let loaded = self.read_file().await;
        debug!(path = %self.path.display(), users = loaded.user_roles.len(), "Loaded role file");
        self.table.write().await.get_or_insert(loaded).clone()
    }

    /// The role assigned to `login`, or the default role.
    pub async fn role_of(&self, login: &str) -> Role {
        self.table().await.user_roles.get(&login.to_lowercase()).copied().unwrap_or(self.default_role)
    }

    /// Whether `login`'s role is granted `action`. Actions missing from the
    /// table are denied.
    pub async fn has_permission(&self, login: &str, action: Action) -> bool {
        let role = self.role_of(login).await;
        self.table().await.permissions.get(&action).is_some_and(|roles| roles.contains(&role))
    }

    /// Explicitly assigned roles, by lowercased login.
    pub async fn user_roles(&self) -> BTreeMap<String, Role> {
        self.table().await.user_roles
    }

    /// Assigns `role` to `login` and persists the file.
    ///
    /// # Errors
    /// I/O or serialization failures.
    pub async fn set_user_role(&self, login: &str, role: Role) -> PermissionResult<()> {
        let _guard = self.writer.lock().await;
        let mut table = self.table().await;
        table.user_roles.insert(login.to_lowercase(), role);

        let file = PermissionFile {
            permissions: Some(table.permissions.clone()),
            user_roles: table.user_roles.clone(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&file)?).await?;
        *self.table.write().await = Some(table);
        info!(user = %login, role = %role, "Assigned role");
        Ok(())
    }
}
