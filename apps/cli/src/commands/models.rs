//! Models command implementation.

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use comfy_table::{Cell, Color as ComfyColor, Table};
use hubwright_core::catalog::workflow_capabilities;
use hubwright_core::{Bot, BotConfig, Capability, ModelCatalog, ModelDescriptor, ModelSelector};

use super::types::ModelsCommand;

/// Executes the models command.
pub async fn execute(command: ModelsCommand, config: &BotConfig) -> Result<()> {
    let catalog = Bot::build_catalog(config).await;
    match command {
        ModelsCommand::List { json, local } => list(&catalog, json, local),
        ModelsCommand::Select { workflow, capabilities, model, tokens } => {
            select(&catalog, workflow.as_deref(), &capabilities, model.as_deref(), tokens)
        }
    }
}

fn capability_list(model: &ModelDescriptor) -> String {
    model.capabilities.iter().map(Capability::as_str).collect::<Vec<_>>().join(", ")
}

fn list(catalog: &ModelCatalog, json_output: bool, local_only: bool) -> Result<()> {
    let models: Vec<&ModelDescriptor> = catalog.iter().filter(|m| !local_only || m.local).collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!("{}", "No models found".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Provider", "Capabilities", "Context", "Performance", ""]);
    for model in models {
        let marker = if model.name == catalog.default_model_name() {
            Cell::new("default").fg(ComfyColor::Green)
        } else if model.local {
            Cell::new("local").fg(ComfyColor::Cyan)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(&model.name),
            Cell::new(model.provider.as_str()),
            Cell::new(capability_list(model)),
            Cell::new(model.context_window),
            Cell::new(format!("{:.2}", model.performance)),
            marker,
        ]);
    }
    println!("{table}");
    Ok(())
}

fn parse_capabilities(raw: &[String]) -> Result<BTreeSet<Capability>> {
    raw.iter()
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.parse::<Capability>().map_err(|e| anyhow!(e)))
        .collect()
}

fn select(
    catalog: &ModelCatalog,
    workflow: Option<&str>,
    capabilities: &[String],
    preference: Option<&str>,
    tokens: u32,
) -> Result<()> {
    let selector = ModelSelector::new(catalog);
    let (chosen, reason) = match (preference, workflow) {
        (Some(name), _) => (selector.select_by_preference(name), format!("preference '{}'", name)),
        (None, Some(workflow)) => (
            selector.select_by_capabilities(&workflow_capabilities(workflow), tokens),
            format!("workflow '{}'", workflow),
        ),
        (None, None) => {
            let required = parse_capabilities(capabilities)?;
            let names: Vec<&str> = required.iter().map(Capability::as_str).collect();
            (selector.select_by_capabilities(&required, tokens), format!("capabilities [{}]", names.join(", ")))
        }
    };

    let model = chosen.with_context(|| {
        format!("No model selected and default model '{}' is not in the catalog", catalog.default_model_name())
    })?;
    println!("{}", model.name);
    tracing::info!(model = %model.name, reason = %reason, tokens, "Model selected");
    Ok(())
}
