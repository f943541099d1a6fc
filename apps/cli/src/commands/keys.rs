//! Keys command implementation.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use hubwright_abstraction::ProviderKind;
use hubwright_core::{BotConfig, DiscoveryContext};
use serde_json::json;

use super::types::KeysCommand;
use crate::config::open_store;

/// Executes the keys command.
pub async fn execute(command: KeysCommand, config: &BotConfig) -> Result<()> {
    match command {
        KeysCommand::List { json } => list(config, json).await,
        KeysCommand::Set { provider, value } => set(config, &provider, value).await,
        KeysCommand::Remove { provider } => remove(config, &provider).await,
        KeysCommand::Discover => discover(config).await,
    }
}

fn parse_provider(raw: &str) -> Result<ProviderKind> {
    let provider: ProviderKind = raw.parse()?;
    if !provider.requires_secret() {
        bail!("Provider '{}' does not use a secret", provider);
    }
    Ok(provider)
}

async fn list(config: &BotConfig, json_output: bool) -> Result<()> {
    let store = open_store(config).await?;
    let configured = store.providers().await;

    if json_output {
        let rows: Vec<_> = ProviderKind::remote()
            .map(|p| json!({ "provider": p.as_str(), "configured": configured.contains(&p) }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    println!("{}", "Provider credentials".bold().cyan());
    println!();
    for provider in ProviderKind::remote() {
        let status = if configured.contains(&provider) {
            "configured".green()
        } else {
            "not configured".dimmed()
        };
        println!("  {:<12} {}", provider.as_str(), status);
    }
    println!();
    Ok(())
}

async fn set(config: &BotConfig, provider: &str, value: Option<String>) -> Result<()> {
    let provider = parse_provider(provider)?;
    let secret = match value {
        Some(value) => value,
        None => rpassword::prompt_password(format!("Enter secret for {}: ", provider))
            .context("Failed to read secret")?,
    };
    let secret = secret.trim();
    if secret.is_empty() {
        bail!("Secret cannot be empty");
    }

    let store = open_store(config).await?;
    store.set(provider, secret).await.context("Failed to store secret")?;
    println!("{}", format!("Stored secret for {}", provider).green());
    Ok(())
}

async fn remove(config: &BotConfig, provider: &str) -> Result<()> {
    let provider = parse_provider(provider)?;
    let store = open_store(config).await?;
    if store.remove(provider).await.context("Failed to remove secret")? {
        println!("{}", format!("Removed secret for {}", provider).green());
    } else {
        println!("{}", format!("No secret stored for {}", provider).yellow());
    }
    Ok(())
}

async fn discover(config: &BotConfig) -> Result<()> {
    let store = open_store(config).await?;
    let remote: Vec<ProviderKind> = ProviderKind::remote().collect();
    let found = store.discover(&remote, &DiscoveryContext::from_process()).await;

    if found.is_empty() {
        println!("{}", "No new credentials found".yellow());
    } else {
        for provider in found {
            println!("{}", format!("Discovered secret for {}", provider).green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("Claude").unwrap(), ProviderKind::Anthropic);
        assert!(parse_provider("local").is_err());
        assert!(parse_provider("gemini").is_err());
    }
}
