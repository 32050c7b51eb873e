//! # Repo Knowledge CLI (`rkb`)
//!
//! Answers questions about a repository's markdown documentation.
//!
//! ## Usage
//!
//! ```bash
//! rkb --config ./config/rkb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rkb init [--force]` | Load the repository documents into the index |
//! | `rkb status` | Show whether the index is loaded |
//! | `rkb search "<query>"` | Ranked excerpts for a query |
//! | `rkb ask "<question>"` | Retrieve context and generate an answer |
//! | `rkb clear [--purge]` | Reset the knowledge base |
//! | `rkb tool list` | List the tool surface |
//! | `rkb tool call <name> '<json>'` | Invoke one tool |
//! | `rkb completions <shell>` | Print shell completions |

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use repo_knowledge::{commands, config};

/// Repo Knowledge: question answering over a repository's markdown docs.
#[derive(Parser)]
#[command(name = "rkb", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rkb.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the knowledge base from the configured repository.
    ///
    /// Reuses an already-loaded index unless `--force` is given.
    Init {
        /// Reload even when the index is already initialized.
        #[arg(long)]
        force: bool,
    },

    /// Show index status.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Search the documentation.
    Search {
        query: String,

        /// Maximum number of results (defaults to `retrieval.max_results`).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the documentation.
    Ask {
        question: String,

        /// Maximum number of chunks used as context.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,

        /// Reload the repository before answering.
        #[arg(long)]
        force_reload: bool,

        #[arg(long)]
        json: bool,
    },

    /// Reset the knowledge base.
    Clear {
        /// Also delete stored vectors for the configured index.
        #[arg(long)]
        purge: bool,
    },

    /// Inspect and invoke the tool surface.
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },

    /// Generate shell completions and print to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ToolAction {
    /// List available tools.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Call a tool with JSON parameters.
    Call {
        /// Tool name, e.g. `search_docs`.
        name: String,
        /// Parameters as a JSON object.
        params: Option<String>,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RKB_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "rkb", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Tool {
            action: ToolAction::List { json },
        } => return commands::run_tool_list(*json),
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { force } => commands::run_init(&cfg, force).await?,
        Commands::Status { json } => commands::run_status(&cfg, json).await?,
        Commands::Search { query, limit, json } => {
            commands::run_search(&cfg, &query, limit.map(|n| n as usize), json).await?
        }
        Commands::Ask {
            question,
            limit,
            force_reload,
            json,
        } => {
            commands::run_ask(&cfg, &question, limit.map(|n| n as usize), force_reload, json)
                .await?
        }
        Commands::Clear { purge } => commands::run_clear(&cfg, purge).await?,
        Commands::Tool { action } => match action {
            ToolAction::Call { name, params } => {
                commands::run_tool_call(&cfg, &name, params.as_deref()).await?
            }
            ToolAction::List { .. } => unreachable!("handled before config loading"),
        },
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}
