//! Built-in workflows: code review, issue triage, PR summary, security scan.
//!
//! Every workflow reads `owner` and `repo` from the context plus either
//! `pull_number` or `issue_number`. The first step of each is critical.

use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use hubwright_abstraction::{ChatMessage, CompletionRequest, ProviderAdapter};
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

use super::definition::{Context, FnStep, StepHandler, WorkflowDefinition};
use super::error::StepError;
use crate::scm::SourceControl;

/// Extensions never sent to a model.
const ASSET_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".ttf", ".eot"];

const MAX_PATCH_CHARS: usize = 4000;

static NUMBERED_ITEM: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+\.\s").ok());

// Context helpers

fn str_field<'a>(context: &'a Context, key: &str) -> Result<&'a str, StepError> {
    context
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StepError::MissingContext(key.to_string()))
}

/// Accepts a JSON number or a numeric string.
fn number_field(context: &Context, key: &str) -> Result<u64, StepError> {
    match context.get(key) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| StepError::Invalid(format!("{} must be a positive integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| StepError::Invalid(format!("{} must be a positive integer, got '{}'", key, s))),
        _ => Err(StepError::MissingContext(key.to_string())),
    }
}

fn array_field<'a>(context: &'a Context, key: &str) -> Result<&'a Vec<Value>, StepError> {
    context
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| StepError::MissingContext(key.to_string()))
}

fn repo_path(context: &Context) -> Result<String, StepError> {
    Ok(format!("/repos/{}/{}", str_field(context, "owner")?, str_field(context, "repo")?))
}

fn output(value: Value) -> Context {
    match value {
        Value::Object(map) => map,
        _ => Context::new(),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// False for images, icons and fonts.
pub fn is_source_file(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    !ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Splits an analysis into its numbered items (`1. ...`, `2. ...`).
pub fn extract_numbered_issues(analysis: &str) -> Vec<String> {
    let Some(re) = NUMBERED_ITEM.as_ref() else {
        return Vec::new();
    };
    let starts: Vec<usize> = re.find_iter(analysis).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(analysis.len());
            analysis[start..end].trim().to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn describe_files(files: &[Value], with_patch: bool) -> String {
    let mut out = String::new();
    for file in files {
        let _ = writeln!(
            out,
            "File: {}\nChanges: +{} -{}\nStatus: {}",
            file["filename"].as_str().unwrap_or("?"),
            file["additions"].as_u64().unwrap_or(0),
            file["deletions"].as_u64().unwrap_or(0),
            file["status"].as_str().unwrap_or("modified"),
        );
        if with_patch && let Some(patch) = file["patch"].as_str() {
            let _ = writeln!(out, "```diff\n{}\n```", patch);
        }
        out.push('\n');
    }
    out
}

// Step handlers

/// Lists the changed source files of a pull request.
struct ExtractFiles {
    scm: Arc<dyn SourceControl>,
}

impl ExtractFiles {
    async fn fetch(scm: &dyn SourceControl, context: &Context) -> Result<Vec<Value>, StepError> {
        let path = format!("{}/pulls/{}/files", repo_path(context)?, number_field(context, "pull_number")?);
        let listing = scm.get(&path, json!({ "per_page": 100 })).await?;
        let files = listing
            .as_array()
            .ok_or_else(|| StepError::Invalid("pull request file listing is not an array".into()))?;

        Ok(files
            .iter()
            .filter_map(|f| {
                let filename = f["filename"].as_str()?;
                if !is_source_file(filename) {
                    return None;
                }
                let mut entry = json!({
                    "filename": filename,
                    "status": f["status"].as_str().unwrap_or("modified"),
                    "additions": f["additions"].as_u64().unwrap_or(0),
                    "deletions": f["deletions"].as_u64().unwrap_or(0),
                });
                if let Some(patch) = f["patch"].as_str() {
                    entry["patch"] = Value::String(truncate_chars(patch, MAX_PATCH_CHARS));
                }
                Some(entry)
            })
            .collect())
    }
}

#[async_trait]
impl StepHandler for ExtractFiles {
    async fn run(&self, context: &Context, _adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        let files = Self::fetch(self.scm.as_ref(), context).await?;
        debug!(count = files.len(), "Extracted pull request files");
        Ok(output(json!({ "files": files })))
    }
}

/// Pull request metadata plus its changed files.
struct ExtractChanges {
    scm: Arc<dyn SourceControl>,
}

#[async_trait]
impl StepHandler for ExtractChanges {
    async fn run(&self, context: &Context, _adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        let path = format!("{}/pulls/{}", repo_path(context)?, number_field(context, "pull_number")?);
        let pull = self.scm.get(&path, Value::Null).await?;
        let files = ExtractFiles::fetch(self.scm.as_ref(), context).await?;
        Ok(output(json!({
            "pull_request": {
                "title": pull["title"].as_str().unwrap_or_default(),
                "body": pull["body"].as_str().unwrap_or_default(),
                "author": pull["user"]["login"].as_str().unwrap_or_default(),
            },
            "files": files,
        })))
    }
}

/// One model call: build a prompt from the context, parse the reply.
struct PromptStep {
    system: &'static str,
    max_tokens: u32,
    build: fn(&Context) -> Result<String, StepError>,
    parse: fn(&str) -> Context,
}

#[async_trait]
impl StepHandler for PromptStep {
    async fn run(&self, context: &Context, adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        let prompt = (self.build)(context)?;
        let request =
            CompletionRequest::new(vec![ChatMessage::system(self.system), ChatMessage::user(prompt)])
                .max_tokens(self.max_tokens);
        let response = adapter.complete(&request).await?;
        Ok((self.parse)(&response.content))
    }
}

/// Posts a context field as a comment on the issue or pull request.
struct PostComment {
    scm: Arc<dyn SourceControl>,
    field: &'static str,
    number_key: &'static str,
}

#[async_trait]
impl StepHandler for PostComment {
    async fn run(&self, context: &Context, _adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        let body = str_field(context, self.field)?;
        let number = number_field(context, self.number_key)?;
        let posted = self
            .scm
            .comment(str_field(context, "owner")?, str_field(context, "repo")?, number, body)
            .await?;
        Ok(output(json!({ "comment_url": posted["html_url"].as_str() })))
    }
}

/// Fetches an issue and asks the model for an analysis of it.
struct AnalyzeIssue {
    scm: Arc<dyn SourceControl>,
}

#[async_trait]
impl StepHandler for AnalyzeIssue {
    async fn run(&self, context: &Context, adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        let path = format!("{}/issues/{}", repo_path(context)?, number_field(context, "issue_number")?);
        let raw = self.scm.get(&path, Value::Null).await?;
        let issue = json!({
            "number": raw["number"],
            "title": raw["title"].as_str().unwrap_or_default(),
            "body": raw["body"].as_str().unwrap_or_default(),
            "author": raw["user"]["login"].as_str().unwrap_or_default(),
        });

        let prompt = format!(
            "Analyze this GitHub issue. Summarize the problem, the affected area and what is needed to resolve it.\n\nTitle: {}\n\n{}",
            issue["title"].as_str().unwrap_or_default(),
            issue["body"].as_str().unwrap_or_default(),
        );
        let request = CompletionRequest::with_system("You are an issue triage assistant.", prompt).max_tokens(800);
        let response = adapter.complete(&request).await?;
        Ok(output(json!({ "issue": issue, "analysis": response.content })))
    }
}

const CATEGORIES: &[&str] = &["bug", "feature", "documentation", "question", "security"];

fn parse_category(reply: &str) -> Context {
    let lower = reply.to_lowercase();
    let category = CATEGORIES.iter().find(|c| lower.contains(*c)).copied().unwrap_or("question");
    output(json!({ "category": category }))
}

fn labels_for(category: &str) -> Vec<&'static str> {
    match category {
        "bug" => vec!["bug"],
        "feature" => vec!["enhancement"],
        "documentation" => vec!["documentation"],
        "security" => vec!["security", "bug"],
        _ => vec!["question"],
    }
}

struct ApplyLabels {
    scm: Arc<dyn SourceControl>,
}

#[async_trait]
impl StepHandler for ApplyLabels {
    async fn run(&self, context: &Context, _adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        let labels = labels_for(str_field(context, "category")?);
        let path = format!("{}/issues/{}/labels", repo_path(context)?, number_field(context, "issue_number")?);
        self.scm.post(&path, json!({ "labels": labels })).await?;
        Ok(output(json!({ "labels": labels })))
    }
}

/// Picks the most active contributor who is neither a bot nor the issue author.
struct SuggestAssignee {
    scm: Arc<dyn SourceControl>,
}

#[async_trait]
impl StepHandler for SuggestAssignee {
    async fn run(&self, context: &Context, _adapter: &dyn ProviderAdapter) -> Result<Context, StepError> {
        let path = format!("{}/contributors", repo_path(context)?);
        let contributors = self.scm.get(&path, json!({ "per_page": 10 })).await?;
        let author = context.get("issue").and_then(|i| i["author"].as_str()).unwrap_or_default();

        let suggested = contributors.as_array().and_then(|list| {
            list.iter()
                .filter_map(|c| c["login"].as_str())
                .find(|login| *login != author && !is_bot(login))
        });
        Ok(output(json!({ "suggested_assignee": suggested })))
    }
}

fn is_bot(login: &str) -> bool {
    login.ends_with("[bot]")
        || login.eq_ignore_ascii_case("dependabot")
        || login.eq_ignore_ascii_case("github-actions")
}

fn identify_tests(context: &Context) -> Result<Context, StepError> {
    let files = array_field(context, "files")?;
    let tests: Vec<&str> = files
        .iter()
        .filter_map(|f| f["filename"].as_str())
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.contains("test") || lower.contains("spec")
        })
        .collect();
    Ok(output(json!({ "has_tests": !tests.is_empty(), "test_files": tests })))
}

fn generate_pr_summary(context: &Context) -> Result<Context, StepError> {
    let files = array_field(context, "files")?;
    let title = context
        .get("pull_request")
        .and_then(|p| p["title"].as_str())
        .unwrap_or("Pull request");
    let summary = context.get("summary").and_then(Value::as_str).unwrap_or("No summary available.");

    let mut report = format!("## Summary: {}\n\n{}\n\n### Files changed ({})\n", title, summary, files.len());
    for file in files {
        let _ = writeln!(
            report,
            "- `{}` (+{} -{})",
            file["filename"].as_str().unwrap_or("?"),
            file["additions"].as_u64().unwrap_or(0),
            file["deletions"].as_u64().unwrap_or(0),
        );
    }
    let tests = context.get("test_files").and_then(Value::as_array).map_or(0, Vec::len);
    let coverage = if tests == 0 {
        "No test files were changed.".to_string()
    } else {
        format!("{} test file(s) changed.", tests)
    };
    let _ = write!(report, "\n### Tests\n{}\n", coverage);
    Ok(output(json!({ "report": report })))
}

const RISK_LEVELS: &[&str] = &["critical", "high", "medium", "low", "none"];

fn parse_risk(reply: &str) -> Context {
    let lower = reply.to_lowercase();
    let level = RISK_LEVELS.iter().find(|l| lower.contains(*l)).copied().unwrap_or("unknown");
    output(json!({ "risk_level": level }))
}

fn generate_security_report(context: &Context) -> Result<Context, StepError> {
    let findings = context.get("findings").and_then(Value::as_array).cloned().unwrap_or_default();
    let risk = context.get("risk_level").and_then(Value::as_str).unwrap_or("unknown");

    let mut report = format!("## Security scan\n\n**Risk level:** {}\n\n", risk);
    if findings.is_empty() {
        report.push_str("No findings.\n");
    } else {
        let _ = writeln!(report, "### Findings ({})", findings.len());
        for finding in findings.iter().filter_map(Value::as_str) {
            let _ = writeln!(report, "- {}", finding);
        }
    }
    Ok(output(json!({ "report": report })))
}

// Definitions

pub fn code_review(scm: Arc<dyn SourceControl>) -> WorkflowDefinition {
    WorkflowDefinition::new("code-review")
        .describe("Review the changed files of a pull request")
        .critical_step("extract-files", "Extract changed files from PR", Arc::new(ExtractFiles { scm: scm.clone() }))
        .step(
            "analyze-code",
            "Analyze code for issues",
            Arc::new(PromptStep {
                system: "You are a code review assistant.",
                max_tokens: 2000,
                build: |ctx| {
                    Ok(format!(
                        "Analyze the following files for code quality, potential bugs, and improvement suggestions:\n\n{}\
                         Provide detailed analysis focusing on:\n1. Code quality issues\n2. Potential bugs\n\
                         3. Performance concerns\n4. Security vulnerabilities\n5. Improvement suggestions",
                        describe_files(array_field(ctx, "files")?, true)
                    ))
                },
                parse: |reply| output(json!({ "analysis": reply, "issues": extract_numbered_issues(reply) })),
            }),
        )
        .step(
            "generate-review",
            "Generate review comments",
            Arc::new(PromptStep {
                system: "You write concise, constructive pull request reviews in Markdown.",
                max_tokens: 1500,
                build: |ctx| {
                    Ok(format!(
                        "Turn this analysis into a pull request review comment:\n\n{}",
                        str_field(ctx, "analysis")?
                    ))
                },
                parse: |reply| output(json!({ "review": reply })),
            }),
        )
        .step(
            "post-comments",
            "Post comments to GitHub PR",
            Arc::new(PostComment { scm, field: "review", number_key: "pull_number" }),
        )
}

pub fn issue_triage(scm: Arc<dyn SourceControl>) -> WorkflowDefinition {
    WorkflowDefinition::new("issue-triage")
        .describe("Analyze, categorize and label a new issue")
        .critical_step("analyze-issue", "Analyze issue content", Arc::new(AnalyzeIssue { scm: scm.clone() }))
        .step(
            "categorize",
            "Categorize issue type",
            Arc::new(PromptStep {
                system: "You classify GitHub issues. Answer with exactly one word.",
                max_tokens: 10,
                build: |ctx| {
                    Ok(format!(
                        "Classify this issue as one of: {}.\n\n{}",
                        CATEGORIES.join(", "),
                        str_field(ctx, "analysis")?
                    ))
                },
                parse: parse_category,
            }),
        )
        .step("assign-labels", "Assign appropriate labels", Arc::new(ApplyLabels { scm: scm.clone() }))
        .step("suggest-assignee", "Suggest appropriate assignee", Arc::new(SuggestAssignee { scm }))
}

pub fn pr_summary(scm: Arc<dyn SourceControl>) -> WorkflowDefinition {
    WorkflowDefinition::new("pr-summary")
        .describe("Summarize a pull request and its test coverage")
        .critical_step("extract-changes", "Extract PR changes", Arc::new(ExtractChanges { scm }))
        .step(
            "summarize-changes",
            "Create a summary of changes",
            Arc::new(PromptStep {
                system: "You summarize pull requests for reviewers.",
                max_tokens: 1000,
                build: |ctx| {
                    let pull = ctx.get("pull_request").cloned().unwrap_or_default();
                    Ok(format!(
                        "Summarize this pull request in a short paragraph.\n\nTitle: {}\n{}\n\n{}",
                        pull["title"].as_str().unwrap_or_default(),
                        pull["body"].as_str().unwrap_or_default(),
                        describe_files(array_field(ctx, "files")?, true)
                    ))
                },
                parse: |reply| output(json!({ "summary": reply.trim() })),
            }),
        )
        .step("identify-tests", "Identify test coverage", Arc::new(FnStep(identify_tests)))
        .step("generate-summary", "Generate a complete PR summary", Arc::new(FnStep(generate_pr_summary)))
}

pub fn security_scan(scm: Arc<dyn SourceControl>) -> WorkflowDefinition {
    WorkflowDefinition::new("security-scan")
        .describe("Scan pull request changes for vulnerabilities")
        .critical_step("extract-code", "Extract code to analyze", Arc::new(ExtractFiles { scm }))
        .step(
            "scan-vulnerabilities",
            "Scan for security vulnerabilities",
            Arc::new(PromptStep {
                system: "You are an application security reviewer.",
                max_tokens: 2000,
                build: |ctx| {
                    Ok(format!(
                        "List every security vulnerability in these changes as a numbered list. \
                         Reply 'None found.' if there are none.\n\n{}",
                        describe_files(array_field(ctx, "files")?, true)
                    ))
                },
                parse: |reply| output(json!({ "analysis": reply, "findings": extract_numbered_issues(reply) })),
            }),
        )
        .step(
            "assess-risk",
            "Assess risk level of findings",
            Arc::new(PromptStep {
                system: "You rate security risk. Answer with exactly one word.",
                max_tokens: 10,
                build: |ctx| {
                    let findings = ctx.get("findings").cloned().unwrap_or_else(|| json!([]));
                    Ok(format!(
                        "Rate the overall risk of these findings as one of: {}.\n\n{}",
                        RISK_LEVELS.join(", "),
                        findings
                    ))
                },
                parse: parse_risk,
            }),
        )
        .step("generate-report", "Generate security report", Arc::new(FnStep(generate_security_report)))
}
