//! Tile images and encoding.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tiny_skia::Pixmap;

use super::TileError;

/// Encoding of tile image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileFormat {
    #[default]
    Png,
    Jpeg,
    /// Uncompressed straight-alpha RGBA, row-major.
    RawRgba,
}

impl TileFormat {
    /// File extension used by the CLI when writing tiles.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
            TileFormat::RawRgba => "rgba",
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileFormat::Png => write!(f, "png"),
            TileFormat::Jpeg => write!(f, "jpeg"),
            TileFormat::RawRgba => write!(f, "rgba"),
        }
    }
}

impl FromStr for TileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(TileFormat::Png),
            "jpeg" | "jpg" => Ok(TileFormat::Jpeg),
            "rgba" | "raw" => Ok(TileFormat::RawRgba),
            other => Err(format!(
                "unknown tile format '{}' (expected png, jpeg or rgba)",
                other
            )),
        }
    }
}

/// An encoded tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub format: TileFormat,
    pub data: Bytes,
}

impl TileImage {
    /// Encode `pixmap` as `format`.
    ///
    /// `quality` (0.0–1.0) applies to JPEG only.
    pub fn encode(pixmap: &Pixmap, format: TileFormat, quality: f32) -> Result<Self, TileError> {
        let rgba = to_rgba_image(pixmap)?;
        let data = match format {
            TileFormat::RawRgba => rgba.into_raw(),
            TileFormat::Png => {
                let mut bytes = Vec::new();
                rgba.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                    .map_err(|e| TileError::EncodingFailed(format!("PNG: {}", e)))?;
                bytes
            }
            TileFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
                let mut bytes = Vec::new();
                JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality))
                    .encode_image(&rgb)
                    .map_err(|e| TileError::EncodingFailed(format!("JPEG: {}", e)))?;
                bytes
            }
        };
        Ok(Self {
            width: pixmap.width(),
            height: pixmap.height(),
            format,
            data: Bytes::from(data),
        })
    }

    /// A fully transparent tile of `size`×`size`.
    pub fn blank(size: u32, format: TileFormat, quality: f32) -> Result<Self, TileError> {
        let pixmap = Pixmap::new(size, size).ok_or(TileError::Surface {
            width: size,
            height: size,
        })?;
        Self::encode(&pixmap, format, quality)
    }

    /// Decode the tile back to straight RGBA pixels.
    pub fn to_rgba(&self) -> Result<RgbaImage, TileError> {
        match self.format {
            TileFormat::RawRgba => RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
                .ok_or_else(|| TileError::EncodingFailed("raw tile has the wrong size".into())),
            TileFormat::Png | TileFormat::Jpeg => image::load_from_memory(&self.data)
                .map(|img| img.to_rgba8())
                .map_err(|e| TileError::EncodingFailed(e.to_string())),
        }
    }
}

/// Map `0.0..=1.0` onto the JPEG encoder's `1..=100`.
fn jpeg_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 60;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

fn to_rgba_image(pixmap: &Pixmap) -> Result<RgbaImage, TileError> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .ok_or_else(|| TileError::EncodingFailed("pixmap size mismatch".into()))
}
