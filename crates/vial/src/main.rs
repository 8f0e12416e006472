//! Vial - inspect and administer server-side sessions.
//!
//! Main entry point for the Vial CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use vial_session::{SessionStore, StoreConfig, load_config_file};

mod commands;

use commands::{session, user};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Vial - inspect and administer server-side sessions
#[derive(Parser)]
#[command(name = "vial")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "VIAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backing store host
    #[arg(long, global = true, env = "VIAL_HOST")]
    pub host: Option<String>,

    /// Backing store port
    #[arg(long, global = true, env = "VIAL_PORT")]
    pub port: Option<u16>,

    /// Database index
    #[arg(long, global = true, env = "VIAL_DB")]
    pub db: Option<i64>,

    /// Key namespace
    #[arg(long, global = true, env = "VIAL_NAMESPACE")]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or edit a single session
    Session(session::SessionArgs),

    /// Sessions bound to a user
    User(user::UserArgs),
}

impl Cli {
    /// Resolve the store config: file (or defaults), then flag overrides.
    fn store_config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => StoreConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db) = self.db {
            config.db = db;
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = Some(namespace.clone());
        }
        Ok(config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "vial=debug,vial_session=debug,info"
    } else {
        "vial=info,vial_session=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.store_config()?;
    let store = SessionStore::from_config(&config)
        .with_context(|| format!("connecting to {}", config.redis_url()))?;
    tracing::debug!(url = %config.redis_url(), namespace = ?config.namespace, "Store ready");

    let ctx = commands::Context {
        store,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Session(args) => session::run(args, &ctx),
        Commands::User(args) => user::run(args, &ctx),
    }
}
