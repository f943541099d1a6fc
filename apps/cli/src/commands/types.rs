//! Command type definitions shared between main.rs and the command modules.

use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum KeysCommand {
    /// Show which providers have a stored secret
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a provider secret
    Set {
        /// Provider id (openai, anthropic, huggingface, replicate, cohere, perplexity)
        provider: String,

        /// Secret value; prompted for when omitted
        value: Option<String>,
    },

    /// Remove a provider secret
    Remove {
        /// Provider id
        provider: String,
    },

    /// Look for secrets in the environment and provider config files
    Discover,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ModelsCommand {
    /// List catalog models
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Only models that run locally
        #[arg(long)]
        local: bool,
    },

    /// Show which model would be chosen
    Select {
        /// Choose for a workflow's required capabilities
        #[arg(long, conflicts_with_all = ["capabilities", "model"])]
        workflow: Option<String>,

        /// Comma-separated capabilities (code, reasoning, summarization, security, research, chat)
        #[arg(long, value_delimiter = ',')]
        capabilities: Vec<String>,

        /// Preferred model name
        #[arg(long, conflicts_with = "capabilities")]
        model: Option<String>,

        /// Estimated request size in tokens
        #[arg(long, default_value_t = 0)]
        tokens: u32,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RolesCommand {
    /// Show assigned roles and the default role
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assign a role to a user
    Set {
        /// GitHub login
        login: String,

        /// Role (anonymous, user, contributor, maintainer, admin, owner)
        role: String,
    },
}
