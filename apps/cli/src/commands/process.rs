//! Process command implementation.

use anyhow::{Result, anyhow};
use hubwright_core::{Bot, BotConfig, RepoRef, RequestContext};

/// Builds the request context from the command-line flags.
pub fn request_context(sender: &str, repo: Option<&str>, issue: Option<u64>) -> Result<RequestContext> {
    let mut context = RequestContext::new(sender);
    if let Some(repo) = repo {
        context = context.in_repo(repo.parse::<RepoRef>().map_err(|e| anyhow!(e))?);
    }
    if let Some(issue) = issue {
        context = context.on_issue(issue);
    }
    Ok(context)
}

/// Routes one message through the bot and prints the reply.
pub async fn execute(
    config: BotConfig,
    text: &str,
    repo: Option<&str>,
    issue: Option<u64>,
    sender: &str,
) -> Result<()> {
    let context = request_context(sender, repo, issue)?;
    let bot = Bot::bootstrap(config).await?;
    let reply = bot.process(text, context).await;
    bot.shutdown();
    println!("{}", reply);
    Ok(())
}
