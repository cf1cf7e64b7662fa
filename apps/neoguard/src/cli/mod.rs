//! # neoguard CLI Module
//!
//! This module implements the CLI interface for neoguard.
//!
//! ## Available Commands
//!
//! - `init` - Initialize an empty store
//! - `run` - Load the raw CSV, refine, score and store the result
//! - `status` - Show the portfolio summary
//! - `top` - List the highest-risk objects
//! - `export` - Export the enriched table
//! - `server` - Start the read-only HTTP server

mod commands;

use crate::settings::Settings;
use clap::{Parser, Subcommand};
use neoguard_core::NeoError;
use std::path::PathBuf;
use std::str::FromStr;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// neoguard - NEO Risk & Pricing
///
/// Refines a raw near-Earth object catalog, scores each object's impact risk
/// relative to its batch and prices an insurance policy for it.
#[derive(Parser, Debug)]
#[command(name = "neoguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML settings file
    #[arg(long, global = true, default_value = "neoguard.toml")]
    pub config: PathBuf,

    /// Path to the store (overrides [paths].database)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "file" (snapshot file) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty store
    Init {
        /// Force initialization even if the store exists
        #[arg(short, long)]
        force: bool,
    },

    /// Load the raw CSV, refine it, score it and replace the stored tables
    Run {
        /// Raw catalog CSV (overrides [paths].csv_raw)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Stop after refinement (clears the stored enriched table)
        #[arg(long)]
        refine_only: bool,
    },

    /// Show the portfolio summary
    Status {
        /// Risk score above which an object counts as critical
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// List the highest-risk objects
    Top {
        /// Number of objects
        #[arg(short, long, default_value = "10")]
        n: usize,
    },

    /// Export the enriched table
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (csv, json, snapshot)
        #[arg(short = 't', long, default_value = "csv")]
        format: String,
    },

    /// Start the read-only HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

// =============================================================================
// RESOLVED CONTEXT
// =============================================================================

/// Where the stored tables live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Snapshot file, loaded into memory and saved after writes.
    File,
    /// redb database.
    Redb,
}

impl Backend {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::File => "file",
            Backend::Redb => "redb",
        }
    }
}

impl FromStr for Backend {
    type Err = NeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "redb" => Ok(Backend::Redb),
            other => Err(NeoError::InvalidConfig(format!(
                "Unknown backend: {}. Use: file, redb",
                other
            ))),
        }
    }
}

/// Settings file merged with the command-line overrides.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub database: PathBuf,
    pub backend: Backend,
    pub json_mode: bool,
    pub verbose: bool,
}

impl Context {
    /// Load the settings file and apply the global flags on top.
    pub fn resolve(cli: &Cli) -> Result<Self, NeoError> {
        let mut settings = Settings::load(&cli.config)?;
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        let database = cli
            .database
            .clone()
            .unwrap_or_else(|| settings.paths.database.clone());
        let backend: Backend = cli
            .backend
            .as_deref()
            .unwrap_or(settings.storage.backend.as_str())
            .parse()?;

        Ok(Self {
            settings,
            database,
            backend,
            json_mode: cli.json_mode,
            verbose: cli.verbose,
        })
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), NeoError> {
    let ctx = Context::resolve(&cli)?;
    if ctx.verbose {
        tracing::info!(
            database = %ctx.database.display(),
            backend = ctx.backend.name(),
            "Resolved settings"
        );
    }

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Run { input, refine_only }) => cmd_run(&ctx, input, refine_only),
        Some(Commands::Status { tolerance }) => cmd_status(&ctx, tolerance),
        Some(Commands::Top { n }) => cmd_top(&ctx, n),
        Some(Commands::Export { output, format }) => cmd_export(&ctx, &output, &format),
        Some(Commands::Server { host, port }) => cmd_server(&ctx, &host, port).await,
        None => {
            // No subcommand - show status by default
            cmd_status(&ctx, None)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
