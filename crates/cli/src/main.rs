//! RagLine CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the LINE webhook server
//! - `ask`  : Answer one question locally, without LINE
//! - `kb`   : Load the knowledge base and inspect matches

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ragline",
    about = "RagLine — LINE knowledge bot",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = ragline_config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP webhook server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer a single question and print the reply payload
    Ask {
        /// The question
        text: String,

        /// Conversation key
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// Inspect the knowledge base
    Kb {
        /// Show what this question matches
        #[arg(short, long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(&cli.config, port).await?,
        Commands::Ask { text, user } => commands::ask::run(&cli.config, &user, &text).await?,
        Commands::Kb { query } => commands::kb::run(&cli.config, query.as_deref()).await?,
    }

    Ok(())
}
