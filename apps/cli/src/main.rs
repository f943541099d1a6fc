//! Hubwright CLI - command-line front end for the repository chat bot.
//!
//! This CLI provides a `hubwright` command for managing provider secrets,
//! inspecting model selection, running workflows and replaying chat input
//! or webhook deliveries without a server.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{KeysCommand, ModelsCommand, RolesCommand, event, keys, models, process, roles, run};

/// Hubwright - a repository chat bot backed by language models
#[derive(Parser, Debug)]
#[command(
    name = "hubwright",
    author,
    version,
    about = "Hubwright - repository chat bot and workflow runner",
    long_about = "Hubwright answers repository chat commands, routes plain-language requests by intent \
                  and runs multi-step code review, triage, summary and security workflows against \
                  the best available language model."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (overrides ./.hubwright.toml and ~/.hubwright/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage provider secrets
    ///
    /// Secrets are encrypted at rest in the credential store. Set
    /// ENCRYPTION_KEY so they can be read back by later runs.
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Inspect the model catalog and selection
    #[command(subcommand)]
    Models(ModelsCommand),

    /// Manage who the bot replies to
    ///
    /// Senders whose role lacks the comment permission get no reply to
    /// webhook events.
    #[command(subcommand)]
    Roles(RolesCommand),

    /// Run a workflow
    ///
    /// Built-in workflows: code-review, issue-triage, pr-summary, security-scan.
    Run {
        /// Workflow name
        workflow: String,

        /// Preferred model (defaults to capability-based selection)
        #[arg(long)]
        model: Option<String>,

        /// Initial context as a JSON object, or @path to a JSON file
        #[arg(long)]
        context: Option<String>,

        /// Output the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Route one chat message and print the reply
    Process {
        /// Message text, e.g. "/help" or "is this repository secure?"
        text: String,

        /// Repository as owner/name
        #[arg(long)]
        repo: Option<String>,

        /// Issue or pull request number
        #[arg(long)]
        issue: Option<u64>,

        /// Login of the sender
        #[arg(long, default_value = "cli")]
        sender: String,
    },

    /// Replay a webhook delivery
    ///
    /// Handles issues/opened, issue_comment/created and pull_request/opened.
    /// The reply is posted as a comment when a source control token is set.
    Event {
        /// Event name as sent in the X-GitHub-Event header
        name: String,

        /// Path to the JSON payload
        payload: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    if let Command::Completions { shell } = command {
        generate(shell, &mut Args::command(), "hubwright", &mut std::io::stdout());
        return Ok(());
    }

    let bot_config = config::load_config(args.config.as_deref())?;

    match command {
        Command::Keys(cmd) => keys::execute(cmd, &bot_config).await?,
        Command::Models(cmd) => models::execute(cmd, &bot_config).await?,
        Command::Roles(cmd) => roles::execute(cmd, &bot_config).await?,
        Command::Run { workflow, model, context, json } => {
            run::execute(bot_config, &workflow, model.as_deref(), context.as_deref(), json).await?;
        }
        Command::Process { text, repo, issue, sender } => {
            process::execute(bot_config, &text, repo.as_deref(), issue, &sender).await?;
        }
        Command::Event { name, payload } => event::execute(bot_config, &name, &payload).await?,
        Command::Completions { .. } => {}
    }

    Ok(())
}
