//! Tessera CLI
//!
//! Reads and edits entities through the same providers applications use,
//! either against a local SQLite file or through a remote provider.

mod commands;
mod config;

use clap::Parser;
use tracing::info;

use crate::commands::Session;
use crate::config::CliConfig;

/// Initializes logging to stderr so stdout carries only JSON.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tessera={level},tessera_persistence={level}"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(2);
    }

    info!(backend = %config.backend_mode(), "Starting tessera");

    let session = Session::connect(&config)?;
    let outcome = session.run(config.command.clone()).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.output)?);

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(not(any(feature = "sqlite", feature = "remote")))]
compile_error!("At least one of the 'sqlite' or 'remote' features must be enabled");
