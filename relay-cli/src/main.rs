//! Relay command-line tool: key setup and service diagnostics.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Key setup and diagnostics for Relay AI services")]
struct Cli {
    /// Key file to read and write (defaults to .keys.json).
    #[arg(long, global = true)]
    keys_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage stored API keys.
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Show discovered services, key sources, and validity.
    Status {
        /// Skip the live validation probes.
        #[arg(long)]
        no_validate: bool,
    },
    /// One-shot question to a model.
    Ask {
        question: String,
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
    },
}

#[derive(Debug, Subcommand)]
enum KeysCommand {
    /// Store a key for a service and validate it.
    Set {
        service: String,
        key: String,
        /// Export to the process environment instead of the key file.
        #[arg(long)]
        env: bool,
    },
    /// Merge another JSON key file into the configured one.
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    // A .env beside the tool may carry provider variables.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Command::Keys { command } => match command {
            KeysCommand::Set { service, key, env } => {
                commands::keys_set(cli.keys_file, &service, &key, env).await
            }
            KeysCommand::Import { file } => commands::keys_import(cli.keys_file, &file),
        },
        Command::Status { no_validate } => commands::status(cli.keys_file, no_validate).await,
        Command::Ask { question, model } => commands::ask(cli.keys_file, &question, &model).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,relay_keys=info,relay_llm=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
