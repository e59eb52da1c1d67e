//! Coordinate conversion module
//!
//! Provides the spherical-mercator (EPSG:3857) forward and inverse transforms,
//! corner-wise bounding-box reprojection, and the tiling grids that turn an
//! `(x, y, z)` tile address into a projected bounding box.

mod grid;
mod types;

pub use grid::{StandardGrid, TileGrid};
pub use types::{BoundingBox, CoordError, TileAddress, MAX_ZOOM};

use std::f64::consts::PI;

/// Sphere radius used by spherical mercator, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the mercator plane; projected values are clamped to it.
pub const MAX_EXTENT: f64 = 20_037_508.342_789_244;

const D2R: f64 = PI / 180.0;
const R2D: f64 = 180.0 / PI;

/// Projection family of a tile request, derived from the map's projection code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// EPSG:4326 longitude/latitude degrees.
    Geographic,
    /// EPSG:3857 spherical mercator meters.
    Mercator,
}

impl Projection {
    /// Classify a projection code such as `"EPSG:4326"` or `"3857"`.
    ///
    /// Matching is by substring, so any code mentioning `4326` or `3857` is
    /// accepted. Returns `None` for anything else.
    pub fn from_code(code: &str) -> Option<Self> {
        if code.contains("4326") {
            Some(Projection::Geographic)
        } else if code.contains("3857") {
            Some(Projection::Mercator)
        } else {
            None
        }
    }
}

/// Direction of a bounding-box reprojection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Geographic degrees to mercator meters.
    Forward,
    /// Mercator meters to geographic degrees.
    Inverse,
}

/// Projects a longitude/latitude pair (degrees) to mercator meters.
///
/// Both axes are clamped to `±MAX_EXTENT`, so poles and longitudes past the
/// antimeridian stay finite instead of diverging.
#[inline]
pub fn forward(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS * lon * D2R;
    let y = EARTH_RADIUS * (PI * 0.25 + 0.5 * lat * D2R).tan().ln();
    (clamp_extent(x), clamp_extent(y))
}

/// Converts mercator meters back to longitude/latitude degrees.
#[inline]
pub fn inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = x * R2D / EARTH_RADIUS;
    let lat = (PI * 0.5 - 2.0 * (-y / EARTH_RADIUS).exp().atan()) * R2D;
    (lon, lat)
}

#[inline]
fn clamp_extent(value: f64) -> f64 {
    if value > MAX_EXTENT {
        MAX_EXTENT
    } else if value < -MAX_EXTENT {
        -MAX_EXTENT
    } else {
        value
    }
}

/// Reprojects a bounding box by transforming its four corners and taking
/// the element-wise min/max.
///
/// This is an axis-aligned approximation of the reprojected rectangle, not
/// an exact reprojection of its boundary. NaN corners are skipped; if every
/// corner is NaN the input box is returned unchanged.
pub fn transform_bounds(bbox: &BoundingBox, direction: Transform) -> BoundingBox {
    let project: fn(f64, f64) -> (f64, f64) = match direction {
        Transform::Forward => forward,
        Transform::Inverse => inverse,
    };
    let corners = bbox.corners().map(|(x, y)| project(x, y));
    BoundingBox::enclosing(corners).unwrap_or(*bbox)
}

/// Geographic bounds to mercator bounds, corner-wise.
pub fn forward_bounds(bbox: &BoundingBox) -> BoundingBox {
    transform_bounds(bbox, Transform::Forward)
}

/// Mercator bounds to geographic bounds, corner-wise.
pub fn inverse_bounds(bbox: &BoundingBox) -> BoundingBox {
    transform_bounds(bbox, Transform::Inverse)
}
