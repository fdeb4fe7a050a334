use std::path::Path;

use anyhow::{Context, Result};
use calfeed_core::CalfeedConfig;
use owo_colors::OwoColorize;

pub fn run(config_path: &Path, init: bool) -> Result<()> {
    if init {
        if config_path.exists() {
            println!(
                "{} {}",
                "Config already exists:".yellow(),
                config_path.display()
            );
        } else {
            CalfeedConfig::create_default_config(config_path)?;
            println!("{} {}", "Created".green(), config_path.display());
        }
    }

    let config = CalfeedConfig::load_from(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    println!("{}", "Paths".bold());
    println!("  Config:      {}", config_path.display());
    println!("  Cache:       {}", config.cache_file().display());
    println!("  Status log:  {}", config.status_log_file().display());
    println!();
    println!("{}", "Settings".bold());
    println!("  Timezone:    {}", config.display_timezone().name());
    println!(
        "  Window:      {} months back, {} months ahead",
        config.window.past_months, config.window.future_months
    );
    println!("  Feeds:       {}", config.feeds.len());

    Ok(())
}
