//! Journal CLI - Command-line interface for the journal store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "journal")]
#[command(about = "Timestamped journal entries kept as plain files", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/journal/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory, overriding the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an entry timestamped now
    Add {
        /// Entry text
        content: String,
    },
    /// List entries, newest first
    List {
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete an entry
    Delete {
        /// Entry ID
        id: String,
    },
    /// Replace the text of an entry
    Edit {
        /// Entry ID
        id: String,
        /// New entry text
        content: String,
    },
    /// Churn the storage directory with concurrent external writers
    Hammer {
        /// Number of concurrent tasks
        #[arg(long)]
        tasks: Option<usize>,
        /// Files written per task
        #[arg(long)]
        files: Option<usize>,
    },
    /// Delete every entry file in the storage directory
    Empty,
    /// Reconcile periodically and print change notifications
    Watch {
        /// Milliseconds between reconciliation passes
        #[arg(long, default_value = "500")]
        interval_ms: u64,
        /// Stop after this many passes (runs until interrupted if omitted)
        #[arg(long)]
        passes: Option<u64>,
    },
    /// Print the resolved storage directory
    Path,
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.data_dir.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Add { content } => commands::entry::add(&config, &content),
        Commands::List { format } => commands::list::run(&config, &format),
        Commands::Delete { id } => commands::entry::delete(&config, &id),
        Commands::Edit { id, content } => commands::entry::edit(&config, &id, &content),
        Commands::Hammer { tasks, files } => commands::hammer::hammer(&config, tasks, files),
        Commands::Empty => commands::hammer::empty(&config),
        Commands::Watch {
            interval_ms,
            passes,
        } => commands::watch::run(&config, interval_ms, passes),
        Commands::Path => commands::path::run(&config),
    }
}
