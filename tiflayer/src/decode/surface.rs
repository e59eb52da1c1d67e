//! Decoded RGBA surfaces.

use std::fmt;

use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Resolution a surface was decoded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionLevel {
    /// Decoded from the coarsest overview.
    Preview,
    /// Decoded from the full-resolution image.
    Full,
}

impl fmt::Display for ResolutionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionLevel::Preview => write!(f, "preview"),
            ResolutionLevel::Full => write!(f, "full"),
        }
    }
}

/// A colorized raster ready for tile extraction.
///
/// Pixels are either opaque or fully transparent `[0, 0, 0, 0]`, so the
/// premultiplied pixmap data equals straight RGBA.
#[derive(Debug, Clone)]
pub struct DecodedSurface {
    pixmap: Pixmap,
    level: ResolutionLevel,
}

impl DecodedSurface {
    pub fn new(pixmap: Pixmap, level: ResolutionLevel) -> Self {
        Self { pixmap, level }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn level(&self) -> ResolutionLevel {
        self.level
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// RGBA of the pixel at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        // Pixmap::pixel only checks the flat index.
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.pixmap.pixel(x, y).map(|p: PremultipliedColorU8| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    /// Raw RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }
}
