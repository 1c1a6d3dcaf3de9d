use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pd_cli::commands::{events, import, normalize, status};
use pd_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<pd_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    pd_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

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
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Import { files }) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = open_database(&config)?;
            let summary = import::run(
                &mut stdout,
                &mut db,
                files,
                config.correlation.pending_policy,
            )?;
            tracing::info!(
                records = summary.records,
                doses = summary.doses,
                inserted = summary.inserted,
                "import complete"
            );
        }
        Some(Commands::Normalize { file }) => {
            // Normalize doesn't touch the database
            let config = load_config(cli.config.as_deref())?;
            normalize::run(&mut stdout, file, config.correlation.pending_policy)?;
        }
        Some(Commands::Events {
            after,
            before,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            events::run(&mut stdout, &db, after.as_deref(), before.as_deref(), *json)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, &config.database_path)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
