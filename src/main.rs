// cupboard - package engine configuration client
//
// Mirrors the package engine's sources, features and settings into a local
// SQLite store and edits them through the engine.
//
// Architecture:
// - Engine (engine/): the authoritative configuration document
// - Store (store/): local document mirror, read by every list operation
// - Service (service/): refresh + write-through-then-mirror mutations
// - Commands (commands.rs): named, discoverable operations over the service
// - CLI (cli.rs): terminal front end
// - Refresher (refresh.rs): periodic background refresh for watch mode

mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod logging;
mod mapper;
mod models;
mod refresh;
mod secret;
mod service;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use commands::CommandRegistry;
use config::Config;
use engine::FileEngine;
use secret::SecretCodec;
use service::ConfigService;
use std::sync::Arc;
use store::LocalStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config file management needs neither the store nor the engine
    if let Commands::Config { show, reset, path } = cli.command {
        return cli::handle_config(show, reset, path);
    }
    if let Commands::Package { path } = &cli.command {
        return cli::handle_package(path);
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let config = Config::from_env()?;

    // Guard must live until exit so file logs flush
    let _log_guard = logging::init(&config.logging);

    tracing::debug!("cupboard v{}", config::VERSION);

    // Composition root: every component is constructed exactly once here
    let codec = SecretCodec::new(&config.secrets.entropy);
    let store = Arc::new(LocalStore::open(&config.db_path).with_context(|| {
        format!("Cannot open local store {}", config.db_path.display())
    })?);
    let engine = Arc::new(FileEngine::new(&config.engine_config));
    tracing::debug!(
        store = %store.path().display(),
        engine = %engine.path().display(),
        "Components ready"
    );

    let service = Arc::new(ConfigService::new(engine, store, codec));
    let registry = CommandRegistry::new(service.clone());

    if config.refresh.on_startup && !cli.offline && cli.command.wants_startup_refresh() {
        cli::startup_refresh(&service)?;
    }

    match cli.command {
        Commands::Refresh => cli::handle_refresh(&service),
        Commands::Sources { json } => cli::handle_sources(&service, json),
        Commands::Features { json } => cli::handle_features(&service, json),
        Commands::Settings { json } => cli::handle_settings(&service, json),
        Commands::Commands => {
            cli::handle_commands(&registry);
            Ok(())
        }
        Commands::Run { name, args } => cli::handle_run(&registry, &name, &args),
        Commands::Source { action } => cli::handle_source(&service, action),
        Commands::Watch => cli::handle_watch(service, &config).await,
        // Handled before the store was opened
        Commands::Package { .. } | Commands::Config { .. } => Ok(()),
    }
}
