//! # Reconciler Configuration Validator
//!
//! Loads a configuration file with the same layering the reconciler uses,
//! validates it and prints the effective settings.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tenant_reconciler::config::ConfigManager;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate tenant reconciler configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults and environment only when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the effective configuration as compact JSON
    #[arg(long)]
    compact: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    match validate(&cli) {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigManager::load().context("loading defaults and environment")?,
    };

    let effective = manager.debug_config();
    let rendered = if cli.compact {
        serde_json::to_string(&effective)?
    } else {
        serde_json::to_string_pretty(&effective)?
    };

    println!("✅ Configuration is valid");
    if let Some(path) = manager.source_file() {
        println!("Source: {}", path.display());
    }
    println!("{rendered}");
    Ok(())
}
