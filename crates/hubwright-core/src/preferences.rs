//! Per-user preferences, one JSON file per login.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value, json};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ParseError;

/// A user's preference object.
pub type Preferences = Map<String, Value>;

#[derive(Error, Debug)]
pub enum PreferenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

static BLANK_LINES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n\s*\n").ok());
static HEADING_MARK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"#+\s+").ok());

pub fn default_preferences() -> Preferences {
    let defaults = json!({
        "notifications": true,
        "responseFormat": "markdown",
        "language": "en",
        "timezone": "UTC",
        "displayMode": "detailed",
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn coerce(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(int) = raw.parse::<i64>() {
                Value::Number(int.into())
            } else if let Some(float) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(float)
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

/// Parses `{"k": v}` or `k=v, k2=v2`. Bare `true`/`false` and numbers are
/// coerced; other values stay strings.
///
/// # Errors
/// [`ParseError`] for empty input, invalid JSON, non-object JSON, or a pair
/// without `=` or a key.
pub fn parse_preference_update(text: &str) -> Result<Preferences, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    if text.starts_with('{') {
        return match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ParseError::NotAnObject),
            Err(e) => Err(ParseError::Json(e.to_string())),
        };
    }
    if text.starts_with('[') || text.starts_with('"') {
        return Err(ParseError::NotAnObject);
    }

    let mut update = Preferences::new();
    for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ParseError::Pair(pair.to_string()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::Pair(pair.to_string()));
        }
        update.insert(key.to_string(), coerce(value.trim()));
    }
    if update.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(update)
}

/// Replaces anything but ASCII letters, digits, `_` and `-`.
fn sanitize_login(login: &str) -> String {
    login
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Directory-backed preference store with an in-memory cache.
#[derive(Debug)]
pub struct PreferenceStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Preferences>>,
}

impl PreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), cache: RwLock::new(HashMap::new()) }
    }

    /// `~/.hubwright/preferences`
    pub fn default_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".hubwright").join("preferences")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn user_path(&self, login: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_login(login)))
    }

    /// The user's preferences; defaults when none are saved or the file is
    /// unreadable.
    pub async fn get(&self, login: &str) -> Preferences {
        if let Some(cached) = self.cache.read().await.get(login) {
            return cached.clone();
        }

        let path = self.user_path(login);
        let loaded = match fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Preferences>(&raw) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable preferences");
                    return default_preferences();
                }
            },
            Err(_) => return default_preferences(),
        };
        self.cache.write().await.insert(login.to_string(), loaded.clone());
        loaded
    }

    /// Saves `preferences` over the defaults and returns what was stored.
    ///
    /// # Errors
    /// I/O or serialization failures.
    pub async fn save(&self, login: &str, preferences: Preferences) -> Result<Preferences, PreferenceError> {
        let mut merged = default_preferences();
        merged.extend(preferences);

        let path = self.user_path(login);
        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, serde_json::to_string_pretty(&merged)?).await?;
        debug!(user = %login, path = %path.display(), "Saved preferences");

        self.cache.write().await.insert(login.to_string(), merged.clone());
        Ok(merged)
    }

    /// Merges `updates` into the user's current preferences.
    ///
    /// # Errors
    /// I/O or serialization failures.
    pub async fn update(&self, login: &str, updates: Preferences) -> Result<Preferences, PreferenceError> {
        let mut current = self.get(login).await;
        current.extend(updates);
        self.save(login, current).await
    }

    /// # Errors
    /// I/O or serialization failures.
    pub async fn reset(&self, login: &str) -> Result<Preferences, PreferenceError> {
        self.save(login, default_preferences()).await
    }

    /// Sanitized logins with saved preferences, sorted.
    pub async fn users(&self) -> Vec<String> {
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return Vec::new();
        };
        let mut users = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                users.push(stem.to_string());
            }
        }
        users.sort();
        users
    }

    /// Applies `displayMode` and `personalizedGreeting` to a reply.
    pub async fn format_response(&self, login: &str, content: &str) -> String {
        let prefs = self.get(login).await;
        let mut formatted = if prefs.get("displayMode").and_then(Value::as_str) == Some("concise") {
            simplify(content)
        } else {
            content.to_string()
        };
        if prefs.get("personalizedGreeting").and_then(Value::as_bool) == Some(true) {
            formatted = format!("Hi @{}! {}", login, formatted);
        }
        formatted
    }
}

/// Collapses blank lines; flattens headings when there are more than two.
fn simplify(content: &str) -> String {
    let mut simplified = match BLANK_LINES.as_ref() {
        Some(re) => re.replace_all(content, "\n").into_owned(),
        None => content.to_string(),
    };
    let headings = simplified.lines().filter(|l| l.starts_with('#')).count();
    if headings > 2
        && let Some(re) = HEADING_MARK.as_ref()
    {
        simplified = re.replace_all(&simplified, "**").into_owned();
    }
    simplified
}
