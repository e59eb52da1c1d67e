//! TifLayer CLI - render map tiles from a GeoTIFF
//!
//! ```text
//! tiflayer info wind.tif
//! tiflayer tile wind.tif -z 3 -x 6 -y 2 --output tile.png
//! tiflayer ramp wind-ramp.json 0 7.5 20
//! ```

mod commands;
mod error;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "tiflayer", version, about = "Render map tiles on demand from a single GeoTIFF")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show image geometry, overviews and resolved bounds of a GeoTIFF
    Info(commands::info::InfoArgs),
    /// Render one tile to a file
    Tile(commands::tile::TileArgs),
    /// Look up values in a JSON color ramp
    Ramp(commands::ramp::RampArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tiflayer={0},tiflayer_cli={0}", level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Ramp(args) => commands::ramp::run(args),
        Commands::Info(args) => runtime()?.block_on(commands::info::run(args)),
        Commands::Tile(args) => runtime()?.block_on(commands::tile::run(args)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
