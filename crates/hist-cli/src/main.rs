use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hist_cli::commands::import;
use hist_cli::{Cli, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let config = cli.import.apply(config);
    tracing::debug!(?config, "loaded configuration");

    let summary = import::run(&config)?;

    if cli.import.json {
        let json = serde_json::to_string_pretty(&summary).context("failed to encode summary")?;
        println!("{json}");
    } else {
        println!("{}", import::render_summary(&summary));
    }

    Ok(())
}
