//! Scrawl CLI
//!
//! Command-line interface for Scrawl - document synchronization.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scrawl_core::sync::{Channel, DocumentChannel};
use scrawl_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "scrawl")]
#[command(about = "Scrawl - document synchronization client")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a config file (defaults to ~/.config/scrawl/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to a document and sync interactively
    Watch {
        /// Document ID to watch
        document_id: String,
        /// Channel to sync (content or summary)
        #[arg(long, default_value = "content")]
        channel: String,
        /// Override the configured sync server URL
        #[arg(long)]
        url: Option<String>,
    },
    /// Push content to a document channel and wait for the ack
    Push {
        /// Document ID to push to
        document_id: String,
        /// Channel to sync (content or summary)
        #[arg(long, default_value = "content")]
        channel: String,
        /// Content to push (reads stdin when omitted)
        #[arg(long)]
        content: Option<String>,
        /// Override the configured sync server URL
        #[arg(long)]
        url: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, debounce_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn parse_channel(name: &str) -> Result<Channel> {
    match name {
        "content" => Ok(Channel::Content),
        "summary" => Ok(Channel::Summary),
        _ => bail!("Unknown channel '{}'. Valid channels: content, summary", name),
    }
}

fn load_config(cli_path: Option<&PathBuf>, url_override: Option<String>) -> Result<Config> {
    let mut config = Config::load_with_cli_override(cli_path)?;
    if let Some(url) = url_override {
        config.server_url = Some(url);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match cli.command {
        Commands::Watch {
            document_id,
            channel,
            url,
        } => {
            let config = load_config(cli.config.as_ref(), url)?;
            let target = DocumentChannel::new(document_id, parse_channel(&channel)?);
            commands::watch::watch(&config, target, &output).await
        }
        Commands::Push {
            document_id,
            channel,
            content,
            url,
        } => {
            let config = load_config(cli.config.as_ref(), url)?;
            let target = DocumentChannel::new(document_id, parse_channel(&channel)?);
            commands::push::push(&config, target, content, &output).await
        }
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(cli.config.as_ref(), &output)
            }
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, cli.config.as_ref(), &output)
            }
        },
    }
}
