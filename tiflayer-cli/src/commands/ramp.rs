//! Ramp command - look up values in a color ramp.

use std::path::PathBuf;

use clap::Args;
use tiflayer::color::ColorRamp;
use tiflayer::config::RampConfig;

use crate::error::CliError;

/// Arguments for the ramp command.
#[derive(Debug, Args)]
pub struct RampArgs {
    /// JSON ramp file, e.g. [[0, "#0000ff"], [10, "#ff0000"]]
    pub file: PathBuf,

    /// Values to look up
    #[arg(required = true, allow_negative_numbers = true)]
    pub values: Vec<f64>,

    /// Divide values by this before the lookup
    #[arg(long)]
    pub ratio: Option<f64>,
}

/// Run the ramp command.
pub fn run(args: RampArgs) -> Result<(), CliError> {
    let ramp = RampConfig {
        file: args.file,
        ratio: args.ratio,
    }
    .load_ramp()?;

    for line in lookup_lines(&ramp, &args.values) {
        println!("{}", line);
    }
    Ok(())
}

fn lookup_lines(ramp: &ColorRamp, values: &[f64]) -> Vec<String> {
    values
        .iter()
        .map(|value| match ramp.lookup(*value) {
            Some(color) => format!("{:>12} {}", value, color),
            None => format!("{:>12} transparent", value),
        })
        .collect()
}
