//! Portico - cookie-session front door for a Drupal CMS
//!
//! Main entry point for the portico CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{check, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Portico - cookie-session front door for a Drupal CMS
#[derive(Parser)]
#[command(name = "portico")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Also write JSON logs to a daily-rotated file in this directory
    #[arg(long, global = true, env = "PORTICO_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the portico server
    Start(start::StartArgs),

    /// Validate configuration and print the resolved settings
    Check(check::CheckArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = init_tracing(cli.verbose, cli.log_dir.as_deref());

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Check(args) => check::run(args, &ctx).await,
    }
}

/// Console layer, plus a JSON file layer when `log_dir` is given.
///
/// The returned guard flushes the file writer and must outlive `main`'s work.
fn init_tracing(verbose: bool, log_dir: Option<&std::path::Path>) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let filter = if verbose {
        "portico=debug,portico_server=debug,portico_oauth=debug,tower_http=debug,info"
    } else {
        "portico=info,portico_server=info,portico_oauth=info,warn"
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "portico.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "portico=trace,portico_server=trace,portico_oauth=trace,tower_http=debug,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();

    guard
}
