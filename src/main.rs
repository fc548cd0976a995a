use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use revhook::config::TaskKind;
use revhook::hook::HookKind;

mod cmd;

#[derive(Parser)]
#[command(name = "revhook")]
#[command(version, about = "LLM code review, test suggestions and commit summaries from git hooks")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to the config file. Defaults to .revhook/revhook.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Review source files function by function
    Review {
        #[command(flatten)]
        args: TaskArgs,
    },
    /// Suggest unit tests for source files
    Test {
        #[command(flatten)]
        args: TaskArgs,
    },
    /// Summarize the staged diff as commit message text
    Commit {
        /// Prepend the summary to this commit message file (prepare-commit-msg)
        #[arg(long)]
        message_file: Option<PathBuf>,
    },
    /// Install or remove the git hooks
    Hook {
        #[command(subcommand)]
        command: HookCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct TaskArgs {
    /// Files to process. Without files, the staged files are used
    pub files: Vec<PathBuf>,

    /// Process the staged version of every staged file
    #[arg(long)]
    pub staged: bool,

    /// Write one markdown report per file into .revhook/reports/
    #[arg(long)]
    pub report: bool,
}

#[derive(Subcommand, Clone)]
pub enum HookCommands {
    /// Write the hook scripts into .git/hooks
    Install {
        /// Only this hook (default: both)
        #[arg(long, value_enum)]
        kind: Option<HookKind>,
        /// Overwrite hooks not written by revhook
        #[arg(long)]
        force: bool,
    },
    /// Remove hook scripts written by revhook
    Uninstall {
        #[arg(long, value_enum)]
        kind: Option<HookKind>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default revhook.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "revhook=debug" } else { "revhook=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let code = match &cli.command {
        Commands::Review { args } => {
            cmd::cmd_task(&cli, &project_dir, TaskKind::Review, args).await?
        }
        Commands::Test { args } => {
            cmd::cmd_task(&cli, &project_dir, TaskKind::TestGeneration, args).await?
        }
        Commands::Commit { message_file } => {
            cmd::cmd_commit(&cli, &project_dir, message_file.as_deref()).await?
        }
        Commands::Hook { command } => {
            cmd::cmd_hook(&project_dir, command.clone())?;
            ExitCode::SUCCESS
        }
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, cli.config.as_deref(), command.clone())?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
