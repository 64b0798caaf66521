//! bashbot CLI — the main entry point.
//!
//! Commands:
//! - `agent`      — Interactive chat or single-message mode
//! - `run-tool`   — Run one tool by hand
//! - `memory`     — Search or summarise the conversation log
//! - `model-info` — Save a model's metadata report
//! - `serve`      — Start the HTTP endpoints

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "bashbot",
    about = "bashbot — a local agent with long-term conversational memory",
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
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run a tool with one value bound to its first required argument
    RunTool {
        /// Tool name, as declared in its manifest
        name: String,
        /// Argument value
        value: String,
    },

    /// Inspect the conversation log
    Memory {
        #[command(subcommand)]
        command: MemoryCommand,
    },

    /// Fetch a model's metadata and write it to a text report
    ModelInfo {
        /// Model name, e.g. `qwen3:8b`
        model: String,
        /// Directory to write the report into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Start the HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// Case-insensitive substring search over past messages
    Search { term: String },
    /// Show message counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Agent { message } => commands::agent::run(message).await?,
        Commands::RunTool { name, value } => commands::run_tool::run(&name, &value).await?,
        Commands::Memory { command } => match command {
            MemoryCommand::Search { term } => commands::memory::search(&term).await?,
            MemoryCommand::Stats => commands::memory::stats().await?,
        },
        Commands::ModelInfo { model, output_dir } => {
            commands::model_info::run(&model, &output_dir).await?
        }
        Commands::Serve { port } => commands::serve::run(port).await?,
    }

    Ok(())
}
