//! Text dispatch: explicit command, closest intent, then fallback.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use super::normalize::{StemmingNormalizer, TextNormalizer, jaccard};

/// Default command prefix.
pub const DEFAULT_SIGIL: char = '/';

/// Minimum similarity an intent must exceed to be chosen.
pub const DEFAULT_INTENT_THRESHOLD: f64 = 0.6;

/// Reply when nothing matches and no fallback is set.
pub const UNRECOGNIZED_MESSAGE: &str =
    "I'm not sure how to respond to that. Type /help for available commands.";

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into() }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("expected owner/name, got '{}'", s)),
        }
    }
}

/// Who is asking, and where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub sender: String,
    pub repository: Option<RepoRef>,
    pub issue_number: Option<u64>,
}

impl RequestContext {
    pub fn new(sender: impl Into<String>) -> Self {
        Self { sender: sender.into(), ..Self::default() }
    }

    #[must_use]
    pub fn in_repo(mut self, repository: RepoRef) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn on_issue(mut self, number: u64) -> Self {
        self.issue_number = Some(number);
        self
    }
}

/// An async reply producer: `(text, context) -> reply`.
///
/// Commands receive the argument string; intents and the fallback receive
/// the full input.
pub type Handler = Arc<dyn Fn(String, RequestContext) -> BoxFuture<'static, String> + Send + Sync>;

/// Wraps an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(String, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    Arc::new(move |text, ctx| Box::pin(f(text, ctx)))
}

struct Intent {
    label: String,
    patterns: Vec<BTreeSet<String>>,
    handler: Handler,
}

/// Routes input text to a handler.
pub struct CommandRouter {
    sigil: char,
    threshold: f64,
    normalizer: Arc<dyn TextNormalizer>,
    commands: HashMap<String, Handler>,
    intents: Vec<Intent>,
    fallback: Option<Handler>,
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("sigil", &self.sigil)
            .field("threshold", &self.threshold)
            .field("commands", &self.command_names())
            .field("intents", &self.intent_labels())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        Self {
            sigil: DEFAULT_SIGIL,
            threshold: DEFAULT_INTENT_THRESHOLD,
            normalizer: Arc::new(StemmingNormalizer::english()),
            commands: HashMap::new(),
            intents: Vec::new(),
            fallback: None,
        }
    }

    #[must_use]
    pub fn with_sigil(mut self, sigil: char) -> Self {
        self.sigil = sigil;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replaces the normalizer. Intents registered earlier keep their
    /// already-normalized patterns, so set this first.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn sigil(&self) -> char {
        self.sigil
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Registers a command and its aliases, all case-insensitive.
    /// Re-registering a name overwrites it.
    pub fn register(&mut self, name: &str, aliases: &[&str], handler: Handler) -> &mut Self {
        for key in std::iter::once(name).chain(aliases.iter().copied()) {
            self.commands.insert(key.to_lowercase(), handler.clone());
        }
        self
    }

    /// Registers an intent. Re-registering a label replaces its patterns and
    /// handler but keeps its original position in the match order.
    pub fn register_intent(&mut self, label: &str, patterns: &[&str], handler: Handler) -> &mut Self {
        let patterns = patterns.iter().map(|p| self.normalizer.normalize(p)).collect();
        let intent = Intent { label: label.to_string(), patterns, handler };
        match self.intents.iter_mut().find(|i| i.label == label) {
            Some(existing) => *existing = intent,
            None => self.intents.push(intent),
        }
        self
    }

    pub fn set_fallback(&mut self, handler: Handler) -> &mut Self {
        self.fallback = Some(handler);
        self
    }

    /// Registered command names and aliases, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn intent_labels(&self) -> Vec<&str> {
        self.intents.iter().map(|i| i.label.as_str()).collect()
    }

    /// Splits `"/name args"` into the lowercased name and trimmed args.
    fn parse_command<'t>(&self, text: &'t str) -> Option<(String, &'t str)> {
        let rest = text.trim_start().strip_prefix(self.sigil)?;
        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if name.is_empty() {
            return None;
        }
        Some((name.to_lowercase(), args.trim()))
    }

    /// The best intent for `text` and its score, if it clears the threshold.
    /// Ties go to the earliest-registered intent.
    pub fn match_intent(&self, text: &str) -> Option<(&str, f64)> {
        let input = self.normalizer.normalize(text);
        let mut best: Option<(&Intent, f64)> = None;
        for intent in &self.intents {
            for pattern in &intent.patterns {
                let score = jaccard(&input, pattern);
                if best.is_none_or(|(_, top)| score > top) {
                    best = Some((intent, score));
                }
            }
        }
        best.filter(|(_, score)| *score > self.threshold)
            .map(|(intent, score)| (intent.label.as_str(), score))
    }

    /// Produces the reply for `text`. Never fails; handlers report their own
    /// problems as text.
    pub async fn process(&self, text: &str, context: RequestContext) -> String {
        if let Some((name, args)) = self.parse_command(text) {
            if let Some(handler) = self.commands.get(&name) {
                debug!(command = %name, sender = %context.sender, "Dispatching command");
                return handler(args.to_string(), context).await;
            }
            debug!(command = %name, "Unknown command, trying intents");
        }

        if let Some((label, score)) = self.match_intent(text)
            && let Some(intent) = self.intents.iter().find(|i| i.label == label)
        {
            debug!(intent = %label, score, "Dispatching intent");
            return (intent.handler)(text.to_string(), context).await;
        }

        match &self.fallback {
            Some(fallback) => fallback(text.to_string(), context).await,
            None => UNRECOGNIZED_MESSAGE.to_string(),
        }
    }
}
