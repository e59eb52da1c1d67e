//! Georeference resolution.
//!
//! Classifies the CRS a GeoTIFF declares and derives its bounds in both
//! supported systems. Exactly one of the two bounds is read from the file;
//! the other is the corner-wise reprojection of it.
//!
//! | Declared CRS | Geographic bounds     | Mercator bounds        |
//! |--------------|-----------------------|------------------------|
//! | 4326 / 4490  | declared              | forward of declared    |
//! | 3857         | inverse of declared   | declared               |
//! | other        | -                     | -                      |

use std::fmt;

use crate::coord::{forward_bounds, inverse_bounds, BoundingBox};
use crate::error::LayerError;

/// EPSG codes treated as longitude/latitude degrees.
pub const GEOGRAPHIC_CODES: [u32; 2] = [4326, 4490];

/// EPSG code of spherical mercator.
pub const MERCATOR_CODE: u32 = 3857;

/// Family of a declared CRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    Geographic,
    Mercator,
    Other,
}

impl CrsKind {
    pub fn classify(code: u32) -> Self {
        if GEOGRAPHIC_CODES.contains(&code) {
            CrsKind::Geographic
        } else if code == MERCATOR_CODE {
            CrsKind::Mercator
        } else {
            CrsKind::Other
        }
    }
}

/// Bounding box and CRS exactly as declared by the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    pub bounds: BoundingBox,
    pub crs: u32,
}

/// Bounds of a source in both supported systems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBounds {
    pub geographic: BoundingBox,
    pub mercator: BoundingBox,
    pub crs: u32,
}

/// Derive geographic and mercator bounds from a declared georeference.
///
/// # Errors
///
/// `UnsupportedProjection` when the CRS is neither geographic nor mercator.
pub fn resolve(reference: &GeoReference) -> Result<ResolvedBounds, LayerError> {
    let GeoReference { bounds, crs } = *reference;
    match CrsKind::classify(crs) {
        CrsKind::Geographic => Ok(ResolvedBounds {
            geographic: bounds,
            mercator: forward_bounds(&bounds),
            crs,
        }),
        CrsKind::Mercator => Ok(ResolvedBounds {
            geographic: inverse_bounds(&bounds),
            mercator: bounds,
            crs,
        }),
        CrsKind::Other => Err(LayerError::UnsupportedProjection(format!("EPSG:{}", crs))),
    }
}

/// A resolved source, immutable for the lifetime of its generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSource {
    pub url: String,
    /// Width of the full-resolution image in pixels.
    pub width: u32,
    /// Height of the full-resolution image in pixels.
    pub height: u32,
    pub geographic_bounds: BoundingBox,
    pub mercator_bounds: BoundingBox,
    /// Declared EPSG code.
    pub crs: u32,
    /// Number of images in the file, full resolution included.
    pub overview_count: usize,
    pub band_count: usize,
}

impl RasterSource {
    pub fn new(
        url: impl Into<String>,
        width: u32,
        height: u32,
        bounds: ResolvedBounds,
        overview_count: usize,
        band_count: usize,
    ) -> Self {
        Self {
            url: url.into(),
            width,
            height,
            geographic_bounds: bounds.geographic,
            mercator_bounds: bounds.mercator,
            crs: bounds.crs,
            overview_count,
            band_count,
        }
    }

    /// Declared CRS as an `EPSG:` code.
    pub fn crs_code(&self) -> String {
        format!("EPSG:{}", self.crs)
    }
}

impl fmt::Display for RasterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}, {}, {} images, {} bands)",
            self.url,
            self.width,
            self.height,
            self.crs_code(),
            self.overview_count,
            self.band_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{forward, MAX_EXTENT};

    #[test]
    fn test_classify() {
        assert_eq!(CrsKind::classify(4326), CrsKind::Geographic);
        assert_eq!(CrsKind::classify(4490), CrsKind::Geographic);
        assert_eq!(CrsKind::classify(3857), CrsKind::Mercator);
        assert_eq!(CrsKind::classify(32633), CrsKind::Other);
    }

    #[test]
    fn test_resolve_geographic() {
        let declared = BoundingBox::new(100.0, 20.0, 120.0, 40.0);
        let resolved = resolve(&GeoReference {
            bounds: declared,
            crs: 4326,
        })
        .unwrap();

        assert_eq!(resolved.geographic, declared);
        let (x0, y0) = forward(100.0, 20.0);
        let (x1, y1) = forward(120.0, 40.0);
        assert!((resolved.mercator.xmin - x0).abs() < 1e-6);
        assert!((resolved.mercator.ymin - y0).abs() < 1e-6);
        assert!((resolved.mercator.xmax - x1).abs() < 1e-6);
        assert!((resolved.mercator.ymax - y1).abs() < 1e-6);
    }

    #[test]
    fn test_resolve_mercator() {
        let declared = BoundingBox::new(-MAX_EXTENT, -MAX_EXTENT, MAX_EXTENT, MAX_EXTENT);
        let resolved = resolve(&GeoReference {
            bounds: declared,
            crs: 3857,
        })
        .unwrap();

        assert_eq!(resolved.mercator, declared);
        assert!((resolved.geographic.xmin + 180.0).abs() < 1e-9);
        assert!((resolved.geographic.xmax - 180.0).abs() < 1e-9);
        assert!((resolved.geographic.ymax - 85.051_128_779_806_6).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_world_geographic_stays_finite() {
        let resolved = resolve(&GeoReference {
            bounds: BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            crs: 4490,
        })
        .unwrap();
        assert!(resolved.mercator.to_array().iter().all(|v| v.is_finite()));
        assert!(resolved.mercator.xmin < resolved.mercator.xmax);
        assert!(resolved.mercator.ymin < resolved.mercator.ymax);
    }

    #[test]
    fn test_resolve_unsupported() {
        let result = resolve(&GeoReference {
            bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            crs: 32633,
        });
        assert_eq!(
            result,
            Err(LayerError::UnsupportedProjection("EPSG:32633".into()))
        );
    }

    #[test]
    fn test_raster_source_display() {
        let resolved = resolve(&GeoReference {
            bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            crs: 4326,
        })
        .unwrap();
        let source = RasterSource::new("wind.tif", 100, 50, resolved, 3, 2);
        assert_eq!(source.crs_code(), "EPSG:4326");
        assert_eq!(source.to_string(), "wind.tif (100x50, EPSG:4326, 3 images, 2 bands)");
    }
}
