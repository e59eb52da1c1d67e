//! Raster decoding: band samples to an RGBA surface.
//!
//! Decoding is staged by the layer. The coarsest image is decoded right
//! after resolution to give a fast preview; the full-resolution image is
//! decoded once the viewport settles and replaces the preview.
//!
//! ```text
//! GeoTiff::read_bands(i) ──► RasterBands ──► decode() ──► DecodedSurface
//!                                              │
//!                                   ColorMapper per pixel
//!                                   (rows in parallel)
//! ```

mod pool;
mod surface;

pub use pool::DecodePool;
pub use surface::{DecodedSurface, ResolutionLevel};

use rayon::prelude::*;
use tiny_skia::{IntSize, Pixmap};

use crate::color::{ColorMapper, Rgb};
use crate::error::LayerError;
use crate::geotiff::{GeoTiff, RasterBands};

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Per-layer decode settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    /// Render pixels of `transparent_color` fully transparent.
    pub ignore_transparent_color: bool,
    pub transparent_color: Rgb,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            ignore_transparent_color: false,
            transparent_color: Rgb::BLACK,
        }
    }
}

impl DecodeOptions {
    #[inline]
    fn colorize(&self, color: Option<Rgb>) -> [u8; 4] {
        match color {
            Some(c) if self.ignore_transparent_color && c == self.transparent_color => TRANSPARENT,
            Some(c) => c.to_rgba(),
            None => TRANSPARENT,
        }
    }
}

/// Colorize `bands` into a surface tagged with `level`.
///
/// Rows are mapped in parallel on the current rayon pool; call this from
/// inside a [`DecodePool`] job.
pub fn decode(
    bands: &RasterBands,
    mapper: &dyn ColorMapper,
    options: &DecodeOptions,
    level: ResolutionLevel,
) -> Result<DecodedSurface, LayerError> {
    let size = IntSize::from_wh(bands.width, bands.height).ok_or_else(|| {
        LayerError::DecodeFailure(format!(
            "Invalid surface size {}x{}",
            bands.width, bands.height
        ))
    })?;

    let stride = bands.width as usize * 4;
    let band_count = bands.band_count;
    let mut data = vec![0u8; stride * bands.height as usize];

    data.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let samples = bands.row(y as u32);
            for (out, sample) in row.chunks_exact_mut(4).zip(samples.chunks_exact(band_count)) {
                out.copy_from_slice(&options.colorize(mapper.map(sample)));
            }
        });

    let pixmap = Pixmap::from_vec(data, size).ok_or_else(|| {
        LayerError::DecodeFailure("Surface buffer does not match its size".into())
    })?;
    Ok(DecodedSurface::new(pixmap, level))
}

/// Read image `index` of `tiff` and colorize it.
///
/// Image 0 is the full-resolution image; any other index is a preview.
pub fn decode_image(
    tiff: &GeoTiff,
    index: usize,
    mapper: &dyn ColorMapper,
    options: &DecodeOptions,
) -> Result<DecodedSurface, LayerError> {
    let bands = tiff.read_bands(index)?;
    let level = if index == 0 {
        ResolutionLevel::Full
    } else {
        ResolutionLevel::Preview
    };
    decode(&bands, mapper, options, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorRamp, PassthroughMapper};

    const LOW: Rgb = Rgb::new(0, 0, 255);
    const HIGH: Rgb = Rgb::new(255, 0, 0);

    fn ramp() -> ColorRamp {
        ColorRamp::new(vec![(0.0, LOW), (10.0, HIGH)]).unwrap()
    }

    #[test]
    fn test_decode_maps_every_pixel() {
        let bands = RasterBands::new(2, 2, vec![0.0, 9.0, f32::NAN, 1.0]).unwrap();
        let surface = decode(
            &bands,
            &ramp(),
            &DecodeOptions::default(),
            ResolutionLevel::Preview,
        )
        .unwrap();

        assert_eq!((surface.width(), surface.height()), (2, 2));
        assert_eq!(surface.level(), ResolutionLevel::Preview);
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(surface.pixel(1, 0), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(0, 1), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(1, 1), Some([0, 0, 255, 255]));
        assert_eq!(surface.pixel(2, 0), None);
    }

    #[test]
    fn test_ignore_transparent_color() {
        let bands = RasterBands::new(2, 1, vec![0.0, 0.0, 0.0, 200.0, 10.0, 10.0]).unwrap();

        let keep = decode(
            &bands,
            &PassthroughMapper,
            &DecodeOptions::default(),
            ResolutionLevel::Full,
        )
        .unwrap();
        assert_eq!(keep.pixel(0, 0), Some([0, 0, 0, 255]));

        let options = DecodeOptions {
            ignore_transparent_color: true,
            ..DecodeOptions::default()
        };
        let drop = decode(&bands, &PassthroughMapper, &options, ResolutionLevel::Full).unwrap();
        assert_eq!(drop.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(drop.pixel(1, 0), Some([200, 10, 10, 255]));
    }

    #[test]
    fn test_filter_values_become_transparent_when_ignored() {
        let mapper = ramp().with_filter_values(vec![-1.0]);
        let bands = RasterBands::new(2, 1, vec![-1.0, 5.0]).unwrap();
        let options = DecodeOptions {
            ignore_transparent_color: true,
            transparent_color: Rgb::BLACK,
        };
        let surface = decode(&bands, &mapper, &options, ResolutionLevel::Full).unwrap();
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(1, 0), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_rows_keep_their_order() {
        let width = 7;
        let height = 64;
        let samples: Vec<f32> = (0..height)
            .flat_map(|y| std::iter::repeat(if y % 2 == 0 { 0.0 } else { 10.0 }).take(width))
            .collect();
        let bands = RasterBands::new(width as u32, height as u32, samples).unwrap();
        let pool = DecodePool::new(4).unwrap();
        let surface = pool
            .install(|| decode(&bands, &ramp(), &DecodeOptions::default(), ResolutionLevel::Full))
            .unwrap();

        for y in 0..height as u32 {
            let expected = if y % 2 == 0 { LOW } else { HIGH };
            assert_eq!(surface.pixel(3, y), Some(expected.to_rgba()), "row {}", y);
        }
    }
}
