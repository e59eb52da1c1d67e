//! Tile extraction from a decoded surface.
//!
//! For each request the extractor finds the tile's bounds, picks the source
//! bounds in the same CRS, maps the tile into source pixel space and
//! crop-scales that window of the surface onto a tile-sized scratch pixmap.
//!
//! ```text
//!   source bounds (xmin, ymin)-(xmax, ymax), W×H pixels
//!   ┌──────────────────────────────┐
//!   │      px,py                   │   ax = W / (xmax - xmin)
//!   │        ┌──────┐              │   ay = H / (ymax - ymin)
//!   │        │ tile │ h            │   px = (tx0 - xmin) * ax
//!   │        └──────┘              │   py = H - (ty1 - ymin) * ay
//!   │           w                  │
//!   └──────────────────────────────┘
//! ```
//!
//! Only bounding boxes are reprojected. The surface itself is never warped,
//! so tiles are an approximation away from the equator when the source and
//! map CRS differ.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tiny_skia::{FilterQuality, Paint, Pattern, Rect, SpreadMode, Transform};
use tracing::debug;

use super::{ScratchPool, TileError, TileFormat, TileImage};
use crate::coord::{BoundingBox, Projection, TileAddress, TileGrid};
use crate::decode::DecodedSurface;
use crate::georef::RasterSource;

/// Replacement for a crop width or height that is exactly zero.
pub const DEGENERATE_EPSILON: f64 = 0.1;

/// Crop window in source pixel space. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    /// The same window on a surface scaled by `(sx, sy)`.
    pub fn scale(&self, sx: f64, sy: f64) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// Map `tile` into the pixel space of a `width`×`height` raster covering
/// `source`.
///
/// A width or height that comes out exactly zero is replaced by
/// [`DEGENERATE_EPSILON`].
pub fn pixel_rect(tile: &BoundingBox, source: &BoundingBox, width: u32, height: u32) -> PixelRect {
    let (w_px, h_px) = (f64::from(width), f64::from(height));
    let ax = w_px / (source.xmax - source.xmin);
    let ay = h_px / (source.ymax - source.ymin);

    let x = (tile.xmin - source.xmin) * ax;
    let y = h_px - (tile.ymax - source.ymin) * ay;
    let mut w = (tile.xmax - tile.xmin) * ax;
    let mut h = (tile.ymax - tile.ymin) * ay;
    if w == 0.0 {
        w = DEGENERATE_EPSILON;
    }
    if h == 0.0 {
        h = DEGENERATE_EPSILON;
    }
    PixelRect {
        x,
        y,
        width: w,
        height: h,
    }
}

/// Sampling used when scaling the crop window to the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    #[default]
    Bilinear,
    Nearest,
}

impl Resampling {
    fn filter(self) -> FilterQuality {
        match self {
            Resampling::Bilinear => FilterQuality::Bilinear,
            Resampling::Nearest => FilterQuality::Nearest,
        }
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resampling::Bilinear => write!(f, "bilinear"),
            Resampling::Nearest => write!(f, "nearest"),
        }
    }
}

impl FromStr for Resampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bilinear" => Ok(Resampling::Bilinear),
            "nearest" => Ok(Resampling::Nearest),
            other => Err(format!(
                "unknown resampling '{}' (expected bilinear or nearest)",
                other
            )),
        }
    }
}

/// Crops and scales tiles out of the current surface.
pub struct TileExtractor {
    grid: Arc<dyn TileGrid>,
    scratch: ScratchPool,
    format: TileFormat,
    quality: f32,
    resampling: Resampling,
    blank: TileImage,
}

impl fmt::Debug for TileExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileExtractor")
            .field("tile_size", &self.scratch.size())
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field("resampling", &self.resampling)
            .finish()
    }
}

impl TileExtractor {
    /// Build an extractor. The blank tile is encoded once, up front.
    pub fn new(
        grid: Arc<dyn TileGrid>,
        scratch: ScratchPool,
        format: TileFormat,
        quality: f32,
        resampling: Resampling,
    ) -> Result<Self, TileError> {
        let blank = TileImage::blank(scratch.size(), format, quality)?;
        Ok(Self {
            grid,
            scratch,
            format,
            quality,
            resampling,
            blank,
        })
    }

    pub fn tile_size(&self) -> u32 {
        self.scratch.size()
    }

    /// The transparent tile served for disjoint tiles and unusable sources.
    pub fn blank(&self) -> TileImage {
        self.blank.clone()
    }

    /// Produce the tile at `address` for a map in `projection_code`.
    ///
    /// Tiles that do not overlap the source get the blank tile without
    /// touching the surface.
    pub fn extract(
        &self,
        address: TileAddress,
        projection_code: &str,
        source: &RasterSource,
        surface: &DecodedSurface,
    ) -> Result<TileImage, TileError> {
        let tile_bounds = self.grid.tile_bounds(address, projection_code)?;
        let source_bounds = match Projection::from_code(projection_code) {
            Some(Projection::Geographic) => source.geographic_bounds,
            Some(Projection::Mercator) => source.mercator_bounds,
            None => return Err(TileError::UnsupportedProjection(projection_code.to_string())),
        };

        if !tile_bounds.intersects(&source_bounds) {
            debug!(x = address.x, y = address.y, z = address.z, "Tile outside source, blank");
            return Ok(self.blank());
        }

        // Surfaces may be decoded from an overview smaller than the source.
        let rect = pixel_rect(&tile_bounds, &source_bounds, source.width, source.height).scale(
            f64::from(surface.width()) / f64::from(source.width),
            f64::from(surface.height()) / f64::from(source.height),
        );

        // Only the part of the window that lies on the surface is painted.
        let left = rect.x.max(0.0);
        let top = rect.y.max(0.0);
        let right = (rect.x + rect.width).min(f64::from(surface.width()));
        let bottom = (rect.y + rect.height).min(f64::from(surface.height()));
        if left >= right || top >= bottom {
            return Ok(self.blank());
        }

        let size = f64::from(self.scratch.size());
        let kx = size / rect.width;
        let ky = size / rect.height;
        let dest = Rect::from_ltrb(
            ((left - rect.x) * kx).clamp(0.0, size) as f32,
            ((top - rect.y) * ky).clamp(0.0, size) as f32,
            ((right - rect.x) * kx).clamp(0.0, size) as f32,
            ((bottom - rect.y) * ky).clamp(0.0, size) as f32,
        );
        let Some(dest) = dest else {
            return Ok(self.blank());
        };

        // The scale can be far beyond what tiny-skia accepts for a drawn
        // pixmap at deep zoom, so the surface is sampled through a pattern
        // and only the tile-sized destination is filled.
        let transform = Transform::from_row(
            kx as f32,
            0.0,
            0.0,
            ky as f32,
            (-rect.x * kx) as f32,
            (-rect.y * ky) as f32,
        );
        let paint = Paint {
            shader: Pattern::new(
                surface.pixmap().as_ref(),
                SpreadMode::Pad,
                self.resampling.filter(),
                1.0,
                transform,
            ),
            ..Paint::default()
        };

        let mut scratch = self.scratch.acquire()?;
        scratch.fill_rect(dest, &paint, Transform::identity(), None);

        debug!(
            x = address.x,
            y = address.y,
            z = address.z,
            px = rect.x,
            py = rect.y,
            w = rect.width,
            h = rect.height,
            level = %surface.level(),
            "Extracted tile"
        );
        TileImage::encode(&scratch, self.format, self.quality)
    }
}
