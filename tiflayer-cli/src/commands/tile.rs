//! Tile command - render one tile from a GeoTIFF to a file.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tiflayer::coord::TileAddress;
use tiflayer::decode::ResolutionLevel;
use tiflayer::{LayerEvent, TifLayer};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::common::{
    build_mapper, load_config, resolve_ramp, FormatArg, ProjectionArg, ResamplingArg,
};
use crate::error::CliError;

/// Default time to wait for a source to load, in seconds.
pub const DEFAULT_WAIT_SECS: u64 = 120;

/// Arguments for the tile command.
#[derive(Debug, Args)]
pub struct TileArgs {
    /// GeoTIFF URL or path (overrides source_url from the config file)
    pub source: Option<String>,

    /// Zoom level
    #[arg(short)]
    pub z: Option<u8>,

    /// Tile column
    #[arg(short)]
    pub x: Option<u32>,

    /// Tile row, counted from the top
    #[arg(short)]
    pub y: Option<u32>,

    /// Tile URL with x, y and z query parameters, instead of -x/-y/-z
    #[arg(long, conflicts_with_all = ["x", "y", "z"])]
    pub url: Option<String>,

    /// Projection of the requesting map
    #[arg(long, value_enum, default_value_t = ProjectionArg::Mercator)]
    pub projection: ProjectionArg,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// INI configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON color ramp (overrides [ramp] from the config file)
    #[arg(long)]
    pub ramp: Option<PathBuf>,

    /// Color the magnitude of the first two bands (u, v) with the ramp
    #[arg(long)]
    pub vector: bool,

    /// Tile encoding
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Sampling used when scaling the source
    #[arg(long, value_enum)]
    pub resampling: Option<ResamplingArg>,

    /// Tile edge length in pixels
    #[arg(long)]
    pub size: Option<u32>,

    /// Render from the full-resolution image instead of the preview
    #[arg(long)]
    pub full: bool,

    /// Seconds to wait for the source to load
    #[arg(long, default_value_t = DEFAULT_WAIT_SECS)]
    pub timeout: u64,
}

impl TileArgs {
    fn address(&self) -> Result<TileAddress, CliError> {
        if let Some(url) = &self.url {
            return TileAddress::from_url(url).map_err(|e| CliError::Arguments(e.to_string()));
        }
        match (self.x, self.y, self.z) {
            (Some(x), Some(y), Some(z)) => Ok(TileAddress::new(x, y, z)),
            _ => Err(CliError::Arguments(
                "pass -x, -y and -z, or --url".to_string(),
            )),
        }
    }
}

/// Run the tile command.
pub async fn run(args: TileArgs) -> Result<(), CliError> {
    let address = args.address()?;
    let file = load_config(args.config.as_deref())?;

    let mut config = file.layer.clone();
    if let Some(source) = &args.source {
        config.source_url = Some(source.clone());
    }
    if let Some(format) = args.format {
        config.output_format = format.into();
    }
    if let Some(resampling) = args.resampling {
        config.resampling = resampling.into();
    }
    if let Some(size) = args.size {
        config.tile_size = size;
    }
    let mapper = build_mapper(resolve_ramp(args.ramp.clone(), &file)?, args.vector);

    let layer = TifLayer::builder(config).mapper(mapper).build()?;
    let mut events = layer.subscribe();
    layer.start().ok_or_else(|| {
        CliError::Arguments("no source; pass one or set source_url in the config file".into())
    })?;

    let wait = Duration::from_secs(args.timeout);
    let level = tokio::time::timeout(wait, wait_until_ready(&mut events))
        .await
        .map_err(|_| CliError::Timeout(args.timeout))??;
    debug!(level = %level, "Source ready");

    if args.full && layer.viewport_settled() {
        tokio::time::timeout(wait, wait_until_full(&mut events))
            .await
            .map_err(|_| CliError::Timeout(args.timeout))??;
    }

    let tile = layer
        .request_tile(address, args.projection.code())
        .await?;
    std::fs::write(&args.output, &tile.data).map_err(|source| CliError::Write {
        path: args.output.clone(),
        source,
    })?;

    info!(tile = %address, path = %args.output.display(), "Tile written");
    println!(
        "Wrote {} ({}x{} {}, {} bytes)",
        args.output.display(),
        tile.width,
        tile.height,
        tile.format,
        tile.data.len()
    );
    Ok(())
}

async fn wait_until_ready(
    events: &mut broadcast::Receiver<LayerEvent>,
) -> Result<ResolutionLevel, CliError> {
    loop {
        match next(events).await? {
            LayerEvent::SourceReady { level, .. } => return Ok(level),
            LayerEvent::SourceFailed { error, .. } => return Err(error.into()),
            LayerEvent::CacheInvalidate { .. } => {}
        }
    }
}

async fn wait_until_full(events: &mut broadcast::Receiver<LayerEvent>) -> Result<(), CliError> {
    loop {
        if let LayerEvent::CacheInvalidate { .. } = next(events).await? {
            return Ok(());
        }
    }
}

async fn next(events: &mut broadcast::Receiver<LayerEvent>) -> Result<LayerEvent, CliError> {
    loop {
        match events.recv().await {
            Ok(event) => return Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::trace!("Layer event receiver lagged by {} messages", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(CliError::Runtime("layer event channel closed".into()));
            }
        }
    }
}
