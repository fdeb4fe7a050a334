mod commands;
mod render;
mod utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use calfeed_core::CalfeedConfig;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "calfeed")]
#[command(about = "Fetch, merge and browse your iCloud and Outlook calendar feeds")]
struct Cli {
    /// Use this config file instead of ~/.config/calfeed/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every feed once and update the cache
    Sync,
    /// Show cached events grouped by day
    Events {
        /// Show events from this date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (YYYY-MM-DD, defaults to a week after --from)
        #[arg(long)]
        to: Option<String>,

        /// Only events from this feed (feed name, "icloud" or "outlook")
        #[arg(short, long)]
        feed: Option<String>,

        /// Only events whose title, description or location contains this text
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Refresh periodically until interrupted
    Watch {
        /// Time between refreshes (e.g. "15m", "1h 30m")
        #[arg(long, default_value = "15m", value_parser = humantime::parse_duration)]
        interval: Duration,
    },
    /// List configured feeds and their last sync result
    Feeds,
    /// Show configuration paths
    Config {
        /// Write a commented default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => CalfeedConfig::config_path()?,
    };

    match cli.command {
        Commands::Config { init } => commands::config::run(&config_path, init),
        Commands::Sync => {
            let config = require_feeds(&config_path)?;
            commands::sync::run(&config).await
        }
        Commands::Events {
            from,
            to,
            feed,
            query,
        } => {
            let config = load_config(&config_path)?;
            let range = utils::dates::AgendaRange::from_args(
                from.as_deref(),
                to.as_deref(),
                config.display_timezone(),
            )?;
            commands::events::run(&config, range, feed.as_deref(), query).await
        }
        Commands::Watch { interval } => {
            let config = require_feeds(&config_path)?;
            commands::watch::run(&config, interval).await
        }
        Commands::Feeds => {
            let config = load_config(&config_path)?;
            commands::feeds::run(&config).await
        }
    }
}

fn load_config(path: &Path) -> Result<CalfeedConfig> {
    CalfeedConfig::load_from(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn require_feeds(path: &Path) -> Result<CalfeedConfig> {
    let config = load_config(path)?;

    if config.feeds.is_empty() {
        anyhow::bail!(
            "No feeds configured.\n\n\
            Create a config file with:\n  \
            calfeed config --init\n\n\
            Then add your feeds to {}",
            path.display()
        );
    }

    Ok(config)
}
