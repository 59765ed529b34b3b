use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ProviderChoice;

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "mergebot",
    version,
    about = "Conventional Commit merge message linter and generator"
)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Backend used to generate messages
    #[arg(long, value_enum, env = "MERGEBOT_PROVIDER", global = true)]
    pub provider: Option<ProviderChoice>,

    /// API key for the remote provider (otherwise uses OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Remote model name (e.g. gpt-4o-mini)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Base URL of the local Ollama daemon
    #[arg(long, global = true)]
    pub local_url: Option<String>,

    /// Local model name (e.g. llama3.2)
    #[arg(long, global = true)]
    pub local_model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands, e.g. `mergebot lint "feat: add x"`
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a message against Conventional Commits; exits 1 when the merge should be blocked
    Lint(LintArgs),

    /// Generate a merge message from pull request context
    Generate(GenerateArgs),

    /// Show whether the on-device model is ready
    Status,

    /// Download the on-device model
    Pull,

    /// Send a short test prompt to the configured provider
    Check,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("source")
        .args(["message", "file"])
        .multiple(false)
))]
pub struct LintArgs {
    /// Message to lint; read from stdin when neither this nor --file is given
    pub message: Option<String>,

    /// Read the message from a file (e.g. the path git passes to a commit-msg hook)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Pull request title; a ticket id in it must also appear in the message
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Your own notes on what changed and why; they take priority over PR details
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Page snapshot JSON; repeat to replay several views of the same pull request in order
    #[arg(long = "page")]
    pub pages: Vec<PathBuf>,

    /// Pull request title (overrides the page)
    #[arg(long)]
    pub title: Option<String>,

    /// Pull request description (overrides the page)
    #[arg(long)]
    pub description: Option<String>,

    /// Source branch used to find a ticket id when the page has none
    #[arg(long)]
    pub branch: Option<String>,

    /// Write the generated message into .git/COMMIT_EDITMSG
    #[arg(long)]
    pub apply: bool,
}
