//! CLI command definitions and dispatch for the `trestle` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod impls;
pub mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Serve resource-oriented web services.
#[derive(Parser)]
#[command(name = "trestle", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout via OpenTelemetry (local development).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the demo web service.
    Serve(ServeArgs),

    /// List the registered service backend implementations.
    Impls,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Arguments for `trestle serve`.
#[derive(Args)]
pub struct ServeArgs {
    /// Host to bind to (overrides the config file).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Service backend implementation to start.
    #[arg(long = "impl", value_name = "IMPL")]
    pub impl_name: Option<String>,

    /// Path to config.toml (defaults to the platform config dir).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Exception detail revealed to clients, as a bit mask.
    #[arg(long, value_name = "N")]
    pub debug_flags: Option<u32>,
}
