//! Run command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use hubwright_core::commands::render_workflow_result;
use hubwright_core::workflow::Context as WorkflowContext;
use hubwright_core::{Bot, BotConfig};
use serde_json::Value;

/// Parses `--context`: inline JSON, or `@path` to read JSON from a file.
pub fn parse_context(raw: Option<&str>) -> Result<WorkflowContext> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(WorkflowContext::new());
    };
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read context file {}", path))?,
        None => raw.to_string(),
    };
    match serde_json::from_str(&text).context("Context is not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Context must be a JSON object"),
    }
}

/// Executes the run command.
pub async fn execute(
    config: BotConfig,
    workflow: &str,
    model: Option<&str>,
    context: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let context = parse_context(context)?;
    let bot = Bot::bootstrap(config).await?;

    if !json_output {
        println!("{}", format!("Running workflow {}", workflow).bold().cyan());
    }
    let result = bot.run_workflow(workflow, context, model).await;
    bot.shutdown();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        println!("{}", render_workflow_result(&result));
    }

    if !result.is_success() {
        bail!("Workflow {} did not complete", workflow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline_context() {
        let ctx = parse_context(Some(r#"{"owner":"o","pull_number":3}"#)).unwrap();
        assert_eq!(ctx["owner"], "o");
        assert!(parse_context(None).unwrap().is_empty());
        assert!(parse_context(Some("  ")).unwrap().is_empty());
        assert!(parse_context(Some("[1]")).is_err());
        assert!(parse_context(Some("{nope")).is_err());
    }

    #[test]
    fn test_parse_context_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, r#"{"repo":"r"}"#).unwrap();

        let ctx = parse_context(Some(&format!("@{}", path.display()))).unwrap();
        assert_eq!(ctx["repo"], "r");
        assert!(parse_context(Some("@/does/not/exist.json")).is_err());
    }
}
