//! Roles command implementation.

use anyhow::Result;
use colored::Colorize;
use hubwright_core::{BotConfig, Role};
use serde_json::json;

use super::types::RolesCommand;
use crate::config::open_roles;

/// Executes the roles command.
pub async fn execute(command: RolesCommand, config: &BotConfig) -> Result<()> {
    let store = open_roles(config);
    match command {
        RolesCommand::List { json } => {
            let roles = store.user_roles().await;
            if json {
                let out = json!({ "default_role": store.default_role(), "users": roles });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!();
            println!("{}", "User roles".bold().cyan());
            println!();
            if roles.is_empty() {
                println!("  {}", "No roles assigned".dimmed());
            }
            for (login, role) in &roles {
                println!("  {:<24} {}", login, role);
            }
            println!();
            println!("  Default role: {}", store.default_role().to_string().yellow());
            println!();
        }
        RolesCommand::Set { login, role } => {
            let role: Role = role.parse()?;
            store.set_user_role(&login, role).await?;
            println!("{}", format!("Assigned role {} to {}", role, login).green());
        }
    }
    Ok(())
}
