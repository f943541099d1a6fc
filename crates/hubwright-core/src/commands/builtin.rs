//! The bot's stock commands, intents and fallback.

use std::fmt::Write as _;
use std::sync::Arc;

use hubwright_abstraction::CompletionRequest;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::router::{CommandRouter, RepoRef, RequestContext, UNRECOGNIZED_MESSAGE, handler};
use crate::catalog::{Capability, ModelCatalog, ModelSelector, capabilities, estimate_tokens};
use crate::credentials::CredentialStore;
use crate::error::ParseError;
use crate::preferences::{PreferenceStore, parse_preference_update};
use crate::scm::SourceControl;
use crate::workflow::{AdapterResolver, Context, WorkflowEngine, WorkflowExecutionResult};

const NEEDS_REPOSITORY: &str = "This command needs a repository context.";

const HELP_TEXT: &str = "## Hubwright Commands

### Repository
- `/status` (`/stat`) - Repository status
- `/issues` - List open issues
- `/prs` - List open pull requests
- `/search [term]` - Search repository code

### Models & workflows
- `/models` - List available models
- `/run <workflow> [using <model>]` (`/workflow`) - Run code-review, issue-triage, pr-summary or security-scan

### Other
- `/ping` (`/pingping`) - Check that the bot is responsive
- `/preferences key=value, key2=value2` (`/prefs`) - Show or update your preferences

You can also ask questions in plain language.";

const GIT_HELP: &str = "## Git Help

```bash
# Create a new branch
git checkout -b feature/your-feature-name

# Stage and commit changes
git add .
git commit -m \"Description of changes\"

# Push, then open a pull request on GitHub
git push origin feature/your-feature-name
```";

const BUG_REPLY: &str = "Thanks for reporting this. Please include the steps to reproduce, what you expected, \
what happened instead, and your version or environment so a maintainer can triage it.";

const FEATURE_REPLY: &str = "Thanks for the suggestion. Describe the problem it solves and how you would like it \
to work; a maintainer will review the request.";

/// Everything the stock handlers need.
#[derive(Clone)]
pub struct BotServices {
    pub scm: Arc<dyn SourceControl>,
    pub engine: WorkflowEngine,
    pub catalog: Arc<RwLock<ModelCatalog>>,
    pub credentials: Arc<CredentialStore>,
    pub resolver: Arc<dyn AdapterResolver>,
    pub preferences: Arc<PreferenceStore>,
}

/// Parses `<workflow> [using <model>]`.
///
/// # Errors
/// [`ParseError::Usage`] when the workflow or model name is missing.
pub fn parse_run_args(args: &str) -> Result<(String, Option<String>), ParseError> {
    const USAGE: &str = "/run <workflow> [using <model>]";
    let mut words = args.split_whitespace();
    let workflow = words.next().ok_or_else(|| ParseError::Usage(USAGE.into()))?;
    match (words.next(), words.next(), words.next()) {
        (None, _, _) => Ok((workflow.to_string(), None)),
        (Some(kw), Some(model), None) if kw.eq_ignore_ascii_case("using") => {
            Ok((workflow.to_string(), Some(model.to_string())))
        }
        _ => Err(ParseError::Usage(USAGE.into())),
    }
}

/// Renders a workflow result as a comment.
pub fn render_workflow_result(result: &WorkflowExecutionResult) -> String {
    let model = result.model_name.as_deref().unwrap_or("no model");
    if !result.is_success() {
        return format!(
            "Workflow `{}` failed: {}",
            result.workflow_name,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    let mut out = ["report", "review", "summary"]
        .iter()
        .find_map(|key| result.context.get(*key).and_then(Value::as_str))
        .map_or_else(
            || format!("Workflow `{}` completed with {} ({} steps).", result.workflow_name, model, result.steps.len()),
            str::to_string,
        );

    let failed: Vec<_> = result.steps.iter().filter_map(|s| s.error().map(|e| (s.name.as_str(), e))).collect();
    if !failed.is_empty() {
        out.push_str("\n\n**Skipped steps:**\n");
        for (name, error) in failed {
            let _ = writeln!(out, "- {}: {}", name, error);
        }
    }
    out
}

impl BotServices {
    fn repository(ctx: &RequestContext) -> Result<&RepoRef, String> {
        ctx.repository.as_ref().ok_or_else(|| NEEDS_REPOSITORY.to_string())
    }

    async fn status(&self, ctx: &RequestContext) -> String {
        let repo = match Self::repository(ctx) {
            Ok(repo) => repo,
            Err(msg) => return msg,
        };
        let data = match self.scm.get(&format!("/repos/{}", repo), Value::Null).await {
            Ok(data) => data,
            Err(e) => return format!("Could not fetch repository status: {}", e),
        };

        let mut out = format!(
            "## Repository Status\n\n- Name: {}\n- Description: {}\n- Stars: {}\n- Forks: {}\n- Open Issues: {}\n- Default Branch: {}\n",
            data["full_name"].as_str().unwrap_or(&repo.to_string()),
            data["description"].as_str().unwrap_or("No description"),
            data["stargazers_count"].as_u64().unwrap_or(0),
            data["forks_count"].as_u64().unwrap_or(0),
            data["open_issues_count"].as_u64().unwrap_or(0),
            data["default_branch"].as_str().unwrap_or("main"),
        );

        let runs_path = format!("/repos/{}/actions/runs", repo);
        match self.scm.get(&runs_path, json!({ "per_page": 5 })).await {
            Ok(runs) => {
                if let Some(runs) = runs["workflow_runs"].as_array().filter(|r| !r.is_empty()) {
                    out.push_str("\n### Recent Workflow Runs\n");
                    for run in runs {
                        let _ = writeln!(
                            out,
                            "- {}: {} ({})",
                            run["name"].as_str().unwrap_or("?"),
                            run["status"].as_str().unwrap_or("?"),
                            run["conclusion"].as_str().unwrap_or("in progress"),
                        );
                    }
                }
            }
            Err(e) => debug!(error = %e, "Workflow runs unavailable"),
        }
        out
    }

    async fn list(&self, ctx: &RequestContext, kind: &str, title: &str) -> String {
        let repo = match Self::repository(ctx) {
            Ok(repo) => repo,
            Err(msg) => return msg,
        };
        let path = format!("/repos/{}/{}", repo, kind);
        let items = match self.scm.get(&path, json!({ "state": "open", "per_page": 10 })).await {
            Ok(items) => items,
            Err(e) => return format!("Could not list {}: {}", kind, e),
        };

        let entries: Vec<&Value> = items
            .as_array()
            .map(|list| {
                list.iter()
                    .filter(|i| kind != "issues" || i.get("pull_request").is_none())
                    .collect()
            })
            .unwrap_or_default();

        let mut out = format!("## {}\n\n", title);
        if entries.is_empty() {
            let _ = write!(out, "No {} found.", title.to_lowercase());
            return out;
        }
        for item in entries {
            let _ = write!(
                out,
                "- [#{}: {}]({})",
                item["number"],
                item["title"].as_str().unwrap_or_default(),
                item["html_url"].as_str().unwrap_or_default()
            );
            let labels: Vec<&str> = item["labels"]
                .as_array()
                .map(|l| l.iter().filter_map(|label| label["name"].as_str()).collect())
                .unwrap_or_default();
            if !labels.is_empty() {
                let _ = write!(out, " (Labels: {})", labels.join(", "));
            }
            out.push('\n');
        }
        out
    }

    async fn search(&self, args: &str, ctx: &RequestContext) -> String {
        if args.trim().is_empty() {
            return "Please provide a search term: `/search [term]`".to_string();
        }
        let repo = match Self::repository(ctx) {
            Ok(repo) => repo,
            Err(msg) => return msg,
        };
        let query = format!("{} repo:{}", args.trim(), repo);
        let results = match self.scm.get("/search/code", json!({ "q": query })).await {
            Ok(results) => results,
            Err(e) => return format!("Search failed: {}", e),
        };

        let total = results["total_count"].as_u64().unwrap_or(0);
        let mut out = format!("## Search Results for \"{}\"\n", args.trim());
        if total == 0 {
            out.push_str("No results found.");
            return out;
        }
        let _ = writeln!(out, "Found {} results.\n", total);
        for item in results["items"].as_array().into_iter().flatten().take(5) {
            let _ = writeln!(
                out,
                "- [{}]({})",
                item["path"].as_str().unwrap_or("?"),
                item["html_url"].as_str().unwrap_or_default()
            );
        }
        out
    }

    async fn models(&self) -> String {
        let configured = self.credentials.providers().await;
        let catalog = self.catalog.read().await;
        let mut out = format!("## Available Models\n\nDefault: `{}`\n\n", catalog.default_model_name());
        for model in catalog.iter() {
            let ready = !model.provider.requires_secret() || configured.contains(&model.provider);
            let caps: Vec<&str> = model.capabilities.iter().map(|c| c.as_str()).collect();
            let _ = writeln!(
                out,
                "- **{}** ({}{}) {} | {} tokens | score {:.2}{}",
                model.name,
                model.provider,
                if model.local { ", local" } else { "" },
                caps.join(", "),
                model.context_window,
                model.performance,
                if ready { "" } else { " | no credential" },
            );
        }
        out
    }

    async fn run(&self, args: &str, ctx: &RequestContext) -> String {
        let (workflow, model) = match parse_run_args(args) {
            Ok(parsed) => parsed,
            Err(e) => return e.to_string(),
        };
        let repo = match Self::repository(ctx) {
            Ok(repo) => repo,
            Err(msg) => return msg,
        };

        let mut context = Context::new();
        context.insert("owner".into(), json!(repo.owner));
        context.insert("repo".into(), json!(repo.name));
        if let Some(number) = ctx.issue_number {
            context.insert("issue_number".into(), json!(number));
            context.insert("pull_number".into(), json!(number));
        }

        let result = self.engine.run(&workflow, context, model.as_deref()).await;
        render_workflow_result(&result)
    }

    async fn preferences(&self, args: &str, ctx: &RequestContext) -> String {
        const USAGE: &str =
            "Usage: `/preferences key1=value1, key2=value2` or `/preferences {\"key1\": \"value1\"}`";

        if args.trim().is_empty() {
            let current = self.preferences.get(&ctx.sender).await;
            let rendered = serde_json::to_string_pretty(&current).unwrap_or_default();
            return format!("Your preferences:\n```json\n{}\n```", rendered);
        }

        let update = match parse_preference_update(args) {
            Ok(update) => update,
            Err(e) => return format!("Error updating preferences: {}\n{}", e, USAGE),
        };
        let rendered = serde_json::to_string_pretty(&update).unwrap_or_default();
        match self.preferences.update(&ctx.sender, update).await {
            Ok(_) => format!("Preferences updated successfully:\n```json\n{}\n```", rendered),
            Err(e) => format!("Error updating preferences: {}", e),
        }
    }

    async fn security(&self, ctx: &RequestContext) -> String {
        let repo = match Self::repository(ctx) {
            Ok(repo) => repo,
            Err(msg) => return msg,
        };
        let path = format!("/repos/{}/dependabot/alerts", repo);
        let Ok(alerts) = self.scm.get(&path, json!({ "state": "open", "per_page": 100 })).await else {
            return "Could not retrieve security information. This may require additional permissions.".to_string();
        };
        let alerts = alerts.as_array().cloned().unwrap_or_default();
        if alerts.is_empty() {
            return "## Repository Security Status\n\nNo open security alerts found.".to_string();
        }

        let severity = |a: &Value| {
            a["security_advisory"]["severity"].as_str().unwrap_or("unknown").to_lowercase()
        };
        let critical = alerts.iter().filter(|a| severity(a) == "critical").count();
        let high = alerts.iter().filter(|a| severity(a) == "high").count();

        let mut out = format!("## Repository Security Status\n\nFound {} open security alerts.\n", alerts.len());
        if critical > 0 {
            let _ = writeln!(out, "- Critical: {}", critical);
        }
        if high > 0 {
            let _ = writeln!(out, "- High: {}", high);
        }
        out.push_str("\n### Recent Alerts\n");
        for alert in alerts.iter().take(5) {
            let _ = writeln!(
                out,
                "- {} ({}) in `{}`",
                alert["security_advisory"]["summary"].as_str().unwrap_or("Untitled"),
                severity(alert),
                alert["dependency"]["manifest_path"].as_str().unwrap_or("?"),
            );
        }
        out
    }

    /// Answers free text with the strongest reasoning model that has a
    /// credential.
    async fn chat(&self, text: &str) -> String {
        let required = capabilities(&[Capability::Reasoning]);
        let credentialed = self.credentials.providers().await;
        let model = {
            let catalog = self.catalog.read().await;
            ModelSelector::new(&catalog)
                .with_credentials(credentialed)
                .select_by_capabilities(&required, estimate_tokens(text))
                .cloned()
        };
        let Some(model) = model else {
            return UNRECOGNIZED_MESSAGE.to_string();
        };

        let secret = if model.provider.requires_secret() {
            match self.credentials.get(model.provider).await {
                Some(secret) => Some(secret),
                None => {
                    debug!(provider = %model.provider, "No credential for fallback chat");
                    return UNRECOGNIZED_MESSAGE.to_string();
                }
            }
        } else {
            None
        };

        let adapter = match self.resolver.resolve(&model, secret.as_deref()) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(model = %model.name, error = %e, "Fallback chat unavailable");
                return UNRECOGNIZED_MESSAGE.to_string();
            }
        };
        let request = CompletionRequest::with_system(
            "You are a helpful assistant for a GitHub repository. Answer concisely.",
            format!("Answer this GitHub related question: {}", text),
        );
        match adapter.complete(&request).await {
            Ok(response) => format!(
                "I'm not sure I fully understood your request, but here's my best guess:\n\n{}\n\nType /help for available commands.",
                response.content.trim()
            ),
            Err(e) => {
                warn!(model = %model.name, error = %e, "Fallback chat failed");
                UNRECOGNIZED_MESSAGE.to_string()
            }
        }
    }
}

/// Registers the stock commands, intents and fallback on `router`.
pub fn register_builtins(router: &mut CommandRouter, services: &BotServices) {
    router.register("help", &[], handler(|_, _| async { HELP_TEXT.to_string() }));
    router.register("ping", &["pingping"], handler(|_, _| async { "pong".to_string() }));

    let s = services.clone();
    router.register(
        "status",
        &["stat"],
        handler(move |_, ctx| {
            let s = s.clone();
            async move { s.status(&ctx).await }
        }),
    );

    let s = services.clone();
    router.register(
        "issues",
        &[],
        handler(move |_, ctx| {
            let s = s.clone();
            async move { s.list(&ctx, "issues", "Open Issues").await }
        }),
    );

    let s = services.clone();
    router.register(
        "prs",
        &[],
        handler(move |_, ctx| {
            let s = s.clone();
            async move { s.list(&ctx, "pulls", "Open Pull Requests").await }
        }),
    );

    let s = services.clone();
    router.register(
        "search",
        &[],
        handler(move |args, ctx| {
            let s = s.clone();
            async move { s.search(&args, &ctx).await }
        }),
    );

    let s = services.clone();
    router.register(
        "models",
        &[],
        handler(move |_, _| {
            let s = s.clone();
            async move { s.models().await }
        }),
    );

    let s = services.clone();
    router.register(
        "run",
        &["workflow"],
        handler(move |args, ctx| {
            let s = s.clone();
            async move { s.run(&args, &ctx).await }
        }),
    );

    let s = services.clone();
    router.register(
        "preferences",
        &["prefs"],
        handler(move |args, ctx| {
            let s = s.clone();
            async move { s.preferences(&args, &ctx).await }
        }),
    );

    let s = services.clone();
    router.register_intent(
        "check_security",
        &[
            "is this repository secure",
            "check for security issues",
            "are there any vulnerabilities",
            "security scan results",
        ],
        handler(move |_, ctx| {
            let s = s.clone();
            async move { s.security(&ctx).await }
        }),
    );
    router.register_intent(
        "help_with_git",
        &["how do I create a PR", "how to make a pull request", "git commit help", "how to use git"],
        handler(|_, _| async { GIT_HELP.to_string() }),
    );
    router.register_intent(
        "report_bug",
        &["I found a bug", "something is broken", "this is not working", "report a bug"],
        handler(|_, _| async { BUG_REPLY.to_string() }),
    );
    router.register_intent(
        "request_feature",
        &["I have a feature request", "can you add a feature", "I would like a new feature", "suggest a feature"],
        handler(|_, _| async { FEATURE_REPLY.to_string() }),
    );
    router.register_intent(
        "thanks",
        &["thank you", "thanks a lot", "thanks for the help", "I appreciate it"],
        handler(|_, ctx| async move { format!("You're welcome, @{}!", ctx.sender) }),
    );

    let s = services.clone();
    router.set_fallback(handler(move |text, _| {
        let s = s.clone();
        async move { s.chat(&text).await }
    }));
}
