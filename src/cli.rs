// CLI module - command-line argument parsing and handlers
//
// The terminal front end over the command registry and config service:
// - refresh / sources / features / settings: inspect the local mirror
// - commands / run: enumerate and execute registered commands
// - source add|remove: edit engine sources
// - watch: keep the mirror fresh in the background
// - config --show|--path|--reset: manage this client's own config file

use crate::commands::CommandRegistry;
use crate::config::{Config, VERSION};
use crate::engine::EnginePackage;
use crate::error::ConfigError;
use crate::mapper;
use crate::models::SourceConfig;
use crate::refresh;
use crate::service::{ConfigService, MutationOutcome};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const REDACTED: &str = "********";

/// cupboard - package source, feature and setting manager
#[derive(Parser)]
#[command(name = "cupboard")]
#[command(version = VERSION)]
#[command(about = "Mirror and edit package engine configuration", long_about = None)]
pub struct Cli {
    /// Skip the refresh that normally runs before a command
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror the engine configuration into the local store
    Refresh,

    /// List package sources
    Sources {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List engine features
    Features {
        #[arg(long)]
        json: bool,
    },

    /// List engine settings
    Settings {
        #[arg(long)]
        json: bool,
    },

    /// List the commands available to `run`
    Commands,

    /// Run a registered command, e.g. `run feature enable checksumFiles`
    Run {
        /// Command name
        name: String,

        /// Command arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Add, update or remove a package source
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Keep the local mirror fresh until Ctrl-C
    Watch,

    /// Show package metadata from an exported feed record (JSON)
    Package { path: PathBuf },

    /// Manage this client's configuration file
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
pub enum SourceAction {
    /// Add a source or replace the one with the same id
    Add {
        id: String,
        url: String,
        #[arg(long, default_value_t = 0)]
        priority: i32,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        cert: Option<String>,
        #[arg(long)]
        cert_password: Option<String>,
        #[arg(long)]
        disabled: bool,
        #[arg(long)]
        admin_only: bool,
        #[arg(long)]
        bypass_proxy: bool,
        #[arg(long)]
        allow_self_service: bool,
    },
    /// Remove a source
    Remove { id: String },
}

impl Commands {
    /// Commands that read the mirror benefit from a refresh first
    pub fn wants_startup_refresh(&self) -> bool {
        matches!(
            self,
            Commands::Sources { .. }
                | Commands::Features { .. }
                | Commands::Settings { .. }
                | Commands::Run { .. }
                | Commands::Source { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mirror commands
// ─────────────────────────────────────────────────────────────────────────────

pub fn handle_refresh(service: &ConfigService) -> Result<()> {
    let report = service.refresh()?;

    println!(
        "Mirrored {} source(s), {} feature(s), {} setting(s); removed {}",
        report.sources, report.features, report.settings, report.removed
    );
    for skipped in &report.skipped {
        println!(
            "  skipped {} '{}': {}",
            skipped.collection, skipped.key, skipped.reason
        );
    }
    Ok(())
}

/// Copy of a source safe to display
fn redact(mut source: SourceConfig) -> SourceConfig {
    if source.password.is_some() {
        source.password = Some(REDACTED.to_string());
    }
    if source.certificate_password.is_some() {
        source.certificate_password = Some(REDACTED.to_string());
    }
    source
}

pub fn handle_sources(service: &ConfigService, json: bool) -> Result<()> {
    let sources: Vec<_> = service.list_sources()?.into_iter().map(redact).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    for source in &sources {
        let mut flags = Vec::new();
        if !source.enabled() {
            flags.push("disabled");
        }
        if source.has_credentials() {
            flags.push("credentials");
        }
        if source.certificate.is_some() {
            flags.push("certificate");
        }
        if source.visible_to_admins_only {
            flags.push("admins-only");
        }
        if source.bypass_proxy {
            flags.push("bypass-proxy");
        }
        if source.allow_self_service {
            flags.push("self-service");
        }
        println!(
            "{:<20} {:>3}  {}  {}",
            source.id,
            source.priority,
            source.url,
            flags.join(",")
        );
    }
    Ok(())
}

pub fn handle_features(service: &ConfigService, json: bool) -> Result<()> {
    let features = service.list_features()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&features)?);
        return Ok(());
    }

    for feature in &features {
        let mark = if feature.enabled { "[x]" } else { "[ ]" };
        println!("{} {:<40} {}", mark, feature.name, feature.description);
    }
    Ok(())
}

pub fn handle_settings(service: &ConfigService, json: bool) -> Result<()> {
    let settings = service.list_settings()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    for setting in &settings {
        println!("{} = {}", setting.key, setting.value);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry commands
// ─────────────────────────────────────────────────────────────────────────────

pub fn handle_commands(registry: &CommandRegistry) {
    for command in registry.commands() {
        println!("{:<10} {}", command.name(), command.description());
        println!("{:<10} usage: {}", "", command.usage());
    }
}

pub fn handle_run(registry: &CommandRegistry, name: &str, args: &[String]) -> Result<()> {
    let outcome = registry.execute(name, args);
    let message = outcome.message.unwrap_or_default();

    if !outcome.success {
        bail!(message);
    }
    if !message.is_empty() {
        println!("{message}");
    }
    Ok(())
}

pub fn handle_source(service: &ConfigService, action: SourceAction) -> Result<()> {
    match action {
        SourceAction::Add {
            id,
            url,
            priority,
            user,
            password,
            cert,
            cert_password,
            disabled,
            admin_only,
            bypass_proxy,
            allow_self_service,
        } => {
            let source = SourceConfig {
                priority,
                user_name: user,
                password,
                certificate: cert,
                certificate_password: cert_password,
                disabled,
                visible_to_admins_only: admin_only,
                bypass_proxy,
                allow_self_service,
                ..SourceConfig::new(id, url)
            };
            let id = source.id.clone();
            match service.set_source(source)? {
                MutationOutcome::Applied => println!("Saved source '{id}'"),
                MutationOutcome::Unchanged => println!("Source '{id}' was already up to date"),
            }
        }
        SourceAction::Remove { id } => match service.remove_source(&id)? {
            MutationOutcome::Applied => println!("Removed source '{id}'"),
            MutationOutcome::Unchanged => println!("Source '{id}' was not configured"),
        },
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch / package
// ─────────────────────────────────────────────────────────────────────────────

pub async fn handle_watch(service: Arc<ConfigService>, config: &Config) -> Result<()> {
    let interval = config.refresh.interval();
    tracing::info!("Watching engine configuration every {:?}", interval);

    let mut refresher = refresh::spawn_refresher(service, interval);
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
        }
        joined = &mut refresher => {
            joined.context("Refresh loop aborted")?;
            bail!("Refresh loop stopped; see log for the store error");
        }
    }

    refresher.abort();
    tracing::info!("Stopping refresh loop");
    Ok(())
}

pub fn handle_package(path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read package record {}", path.display()))?;
    let record: EnginePackage = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid package record {}", path.display()))?;

    let package = mapper::map_package(&record);
    println!("{}", serde_json::to_string_pretty(&package)?);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Client config file
// ─────────────────────────────────────────────────────────────────────────────

pub fn handle_config(show: bool, reset: bool, path: bool) -> Result<()> {
    if path {
        handle_config_path()
    } else if show {
        handle_config_show()
    } else if reset {
        handle_config_reset()
    } else {
        println!("Usage: cupboard config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
        Ok(())
    }
}

fn handle_config_path() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;
    println!("{}", path.display());
    Ok(())
}

fn handle_config_show() -> Result<()> {
    let config = Config::from_env()?;

    println!("# Effective configuration (env > file > defaults)");
    println!();
    print!("{}", config.to_toml());

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
    Ok(())
}

fn handle_config_reset() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Error creating directory {}", parent.display()))?;
    }

    std::fs::write(&path, Config::default().to_toml())
        .with_context(|| format!("Error writing config {}", path.display()))?;

    println!("Config reset to defaults: {}", path.display());
    Ok(())
}

/// Startup refresh: an unreachable engine is not fatal, the mirror still serves reads
pub fn startup_refresh(service: &ConfigService) -> Result<()> {
    match service.refresh() {
        Ok(report) => {
            for skipped in &report.skipped {
                tracing::warn!(
                    "Skipped {} '{}': {}",
                    skipped.collection,
                    skipped.key,
                    skipped.reason
                );
            }
            Ok(())
        }
        Err(ConfigError::EngineUnavailable(reason)) => {
            tracing::warn!("Using local mirror, engine unavailable: {}", reason);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
