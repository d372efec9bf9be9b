//! Viewer CLI - Command line tool for the 3D product viewer.
//!
//! Commands:
//! - `viewer config` - Show, validate or create configuration
//! - `viewer resolve` - Print asset URLs for a product variant
//! - `viewer verify` - Check that every catalog asset exists on disk
//! - `viewer simulate` - Run a page of headless viewers against local assets

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConfigArgs, ResolveArgs, SimulateArgs, VerifyArgs};

/// Viewer CLI - Inspect and exercise 3D product viewer assets
#[derive(Parser)]
#[command(name = "viewer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage viewer configuration
    Config(ConfigArgs),

    /// Print model and poster URLs for a product
    Resolve(ResolveArgs),

    /// Check that every catalog variant has its assets
    Verify(VerifyArgs),

    /// Simulate a page of viewers with a headless renderer
    Simulate(SimulateArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "viewer=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Resolve(args) => commands::resolve::run(args, &ctx).await,
        Commands::Verify(args) => commands::verify::run(args, &ctx).await,
        Commands::Simulate(args) => commands::simulate::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
