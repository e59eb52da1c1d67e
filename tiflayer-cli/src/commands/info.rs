//! Info command - describe a GeoTIFF source.

use clap::Args;
use tiflayer::geotiff::GeoTiff;
use tiflayer::georef;
use tiflayer::source::{DefaultFetcher, SourceFetcher};
use tiflayer::LayerError;

use crate::error::CliError;

/// Arguments for the info command.
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// GeoTIFF URL or path
    pub source: String,
}

/// Run the info command.
pub async fn run(args: InfoArgs) -> Result<(), CliError> {
    let fetcher = DefaultFetcher::new()?;
    let data = fetcher.fetch(&args.source).await?;
    let size = data.len();
    let tiff = GeoTiff::parse(data).map_err(LayerError::from)?;

    println!("Source:   {} ({} bytes)", args.source, size);
    println!("Size:     {}x{}", tiff.width(), tiff.height());
    println!("Bands:    {}", tiff.band_count());
    if let Some(nodata) = tiff.nodata() {
        println!("NoData:   {}", nodata);
    }

    println!("Images:");
    for (index, image) in tiff.images().iter().enumerate() {
        let note = if index == 0 {
            " full resolution"
        } else if index == tiff.coarsest_image_index() {
            " preview"
        } else {
            ""
        };
        println!("  [{}] {}x{}{}", index, image.width, image.height, note);
    }

    let resolved = tiff
        .georeference()
        .map_err(LayerError::from)
        .and_then(|reference| georef::resolve(&reference));
    match resolved {
        Ok(bounds) => {
            println!("CRS:      EPSG:{}", bounds.crs);
            println!("Bounds:   {} (EPSG:4326)", bounds.geographic);
            println!("          {} (EPSG:3857)", bounds.mercator);
        }
        Err(e) => println!("Unusable: {}", e),
    }

    Ok(())
}
