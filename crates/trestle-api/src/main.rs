//! Trestle CLI entry point.
//!
//! Binary name: `trestle`
//!
//! Parses CLI arguments, initializes tracing, then dispatches to the
//! appropriate command handler.

mod cli;
mod demo;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    if let Err(err) = trestle_observe::init_tracing(filter, cli.otel) {
        eprintln!("Warning: tracing init failed: {err}");
    }

    // Shell completions don't need a running service
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "trestle", &mut std::io::stdout());
        return Ok(());
    }

    match cli.command {
        Commands::Serve(args) => cli::serve::run(args).await?,
        Commands::Impls => cli::impls::run(cli.json),
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    trestle_observe::shutdown_tracing();
    Ok(())
}
