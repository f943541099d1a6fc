//! Event command implementation: replays a stored webhook delivery.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use hubwright_core::{Bot, BotConfig, RepositoryEvent};
use serde_json::Value;

/// Executes the event command.
pub async fn execute(config: BotConfig, name: &str, payload: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(payload)
        .with_context(|| format!("Failed to read payload {}", payload.display()))?;
    let payload: Value = serde_json::from_str(&raw).context("Payload is not valid JSON")?;

    let Some(event) = RepositoryEvent::from_webhook(name, &payload) else {
        println!("{}", format!("Event '{}' is not handled", name).yellow());
        return Ok(());
    };

    let bot = Bot::bootstrap(config).await?;
    let outcome = bot.handle_event(&event).await;
    bot.shutdown();

    match outcome? {
        Some(reply) => println!("{}", reply),
        None => println!("{}", "Ignored event from a bot account or a sender without comment permission".yellow()),
    }
    Ok(())
}
