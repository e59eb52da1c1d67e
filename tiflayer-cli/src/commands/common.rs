//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ValueEnum;
use tiflayer::color::{ColorMapper, ColorRamp, PassthroughMapper, VectorMagnitude};
use tiflayer::config::{ConfigFile, LayerConfig, RampConfig};
use tiflayer::tile::{Resampling, TileFormat};

use crate::error::CliError;

/// Map projection selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProjectionArg {
    /// Web mercator (EPSG:3857)
    Mercator,
    /// Longitude/latitude (EPSG:4326)
    Geographic,
}

impl ProjectionArg {
    pub fn code(&self) -> &'static str {
        match self {
            ProjectionArg::Mercator => "EPSG:3857",
            ProjectionArg::Geographic => "EPSG:4326",
        }
    }
}

/// Tile encoding selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Png,
    Jpeg,
    /// Unencoded RGBA bytes
    Raw,
}

impl From<FormatArg> for TileFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Png => TileFormat::Png,
            FormatArg::Jpeg => TileFormat::Jpeg,
            FormatArg::Raw => TileFormat::RawRgba,
        }
    }
}

/// Resampling selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResamplingArg {
    Bilinear,
    Nearest,
}

impl From<ResamplingArg> for Resampling {
    fn from(resampling: ResamplingArg) -> Self {
        match resampling {
            ResamplingArg::Bilinear => Resampling::Bilinear,
            ResamplingArg::Nearest => Resampling::Nearest,
        }
    }
}

/// Load the config file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load(path)?),
        None => Ok(ConfigFile {
            layer: LayerConfig::default(),
            ramp: None,
        }),
    }
}

/// Resolve the color ramp: CLI takes precedence, then config.
pub fn resolve_ramp(
    cli_ramp: Option<PathBuf>,
    config: &ConfigFile,
) -> Result<Option<ColorRamp>, CliError> {
    let ramp_config = match cli_ramp {
        Some(file) => Some(RampConfig { file, ratio: None }),
        None => config.ramp.clone(),
    };
    match ramp_config {
        Some(ramp_config) => Ok(Some(ramp_config.load_ramp()?)),
        None => Ok(None),
    }
}

/// Pick the sample mapper for a ramp.
///
/// Without a ramp, band values are shown as they are.
pub fn build_mapper(ramp: Option<ColorRamp>, vector: bool) -> Arc<dyn ColorMapper> {
    match ramp {
        Some(ramp) if vector => Arc::new(VectorMagnitude::new(ramp)),
        Some(ramp) => Arc::new(ramp),
        None => Arc::new(PassthroughMapper),
    }
}
