//! feeds command-line entry point.
//!
//! Command output goes to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use feeds_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(Some(path.as_path())),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    let output = match cli.command {
        Command::Fetch { namespace, urls, dont_cache, expires_secs } => {
            let options = commands::fetch::FetchOptions { dont_cache, expires_secs };
            commands::fetch::run(&config, &namespace, &urls, options).await?
        }
        Command::Get { namespace, key } => commands::get::run(&config, &namespace, &key)?,
        Command::Purge { namespace, url } => commands::purge::run(&config, &namespace, &url)?,
        Command::Cleanup => commands::cleanup::run(&config)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.loglevel.as_directive()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
