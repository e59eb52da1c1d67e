//! Tiling schemes: the bounds-for-address function supplied to the extractor.
//!
//! The map viewer owns its tiling scheme. The [`TileGrid`] trait lets the
//! viewer hand that scheme to the core as a strategy object, so tile
//! extraction never assumes a specific rendering host.
//!
//! # Example
//!
//! ```
//! use tiflayer::coord::{StandardGrid, TileAddress, TileGrid};
//!
//! let grid = StandardGrid;
//! let bounds = grid.tile_bounds(TileAddress::new(0, 0, 0), "EPSG:4326").unwrap();
//! assert_eq!(bounds.to_array(), [-180.0, -90.0, 0.0, 90.0]);
//! ```

use super::{BoundingBox, CoordError, Projection, TileAddress, MAX_EXTENT, MAX_ZOOM};

/// Strategy that computes a tile's projected bounding box.
///
/// Implementations must be thread-safe (`Send + Sync`) because tile
/// extraction runs on worker threads.
pub trait TileGrid: Send + Sync {
    /// Bounding box of `address` in the CRS named by `projection_code`.
    fn tile_bounds(
        &self,
        address: TileAddress,
        projection_code: &str,
    ) -> Result<BoundingBox, CoordError>;
}

/// The common XYZ schemes with the origin at the top-left.
///
/// - EPSG:3857: one tile at zoom 0 covering `±MAX_EXTENT` on both axes.
/// - EPSG:4326: two tiles at zoom 0 (`2^(z+1)` columns, `2^z` rows), each
///   `180 / 2^z` degrees wide.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardGrid;

impl StandardGrid {
    fn mercator_bounds(address: TileAddress) -> Result<BoundingBox, CoordError> {
        let n = 1u64 << address.z;
        if u64::from(address.x) >= n || u64::from(address.y) >= n {
            return Err(out_of_range(address));
        }
        let span = 2.0 * MAX_EXTENT / n as f64;
        let xmin = -MAX_EXTENT + address.x as f64 * span;
        let ymax = MAX_EXTENT - address.y as f64 * span;
        Ok(BoundingBox::new(xmin, ymax - span, xmin + span, ymax))
    }

    fn geographic_bounds(address: TileAddress) -> Result<BoundingBox, CoordError> {
        let rows = 1u64 << address.z;
        let cols = rows * 2;
        if u64::from(address.x) >= cols || u64::from(address.y) >= rows {
            return Err(out_of_range(address));
        }
        let span = 180.0 / rows as f64;
        let xmin = -180.0 + address.x as f64 * span;
        let ymax = 90.0 - address.y as f64 * span;
        Ok(BoundingBox::new(xmin, ymax - span, xmin + span, ymax))
    }
}

fn out_of_range(address: TileAddress) -> CoordError {
    CoordError::OutOfRange {
        x: address.x,
        y: address.y,
        z: address.z,
    }
}

impl TileGrid for StandardGrid {
    fn tile_bounds(
        &self,
        address: TileAddress,
        projection_code: &str,
    ) -> Result<BoundingBox, CoordError> {
        if address.z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(address.z));
        }
        match Projection::from_code(projection_code) {
            Some(Projection::Mercator) => Self::mercator_bounds(address),
            Some(Projection::Geographic) => Self::geographic_bounds(address),
            None => Err(CoordError::UnsupportedProjection(
                projection_code.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mercator_zoom_zero_covers_world() {
        let bounds = StandardGrid
            .tile_bounds(TileAddress::new(0, 0, 0), "EPSG:3857")
            .unwrap();
        assert_eq!(
            bounds,
            BoundingBox::new(-MAX_EXTENT, -MAX_EXTENT, MAX_EXTENT, MAX_EXTENT)
        );
    }

    #[test]
    fn test_mercator_y_grows_southward() {
        let north = StandardGrid
            .tile_bounds(TileAddress::new(0, 0, 1), "EPSG:3857")
            .unwrap();
        let south = StandardGrid
            .tile_bounds(TileAddress::new(0, 1, 1), "EPSG:3857")
            .unwrap();
        assert_eq!(north.ymin, 0.0);
        assert_eq!(north.ymax, MAX_EXTENT);
        assert_eq!(south.ymax, 0.0);
        assert_eq!(south.ymin, -MAX_EXTENT);
    }

    #[test]
    fn test_geographic_zoom_zero_has_two_tiles() {
        let west = StandardGrid
            .tile_bounds(TileAddress::new(0, 0, 0), "EPSG:4326")
            .unwrap();
        let east = StandardGrid
            .tile_bounds(TileAddress::new(1, 0, 0), "EPSG:4326")
            .unwrap();
        assert_eq!(west.to_array(), [-180.0, -90.0, 0.0, 90.0]);
        assert_eq!(east.to_array(), [0.0, -90.0, 180.0, 90.0]);
    }

    #[test]
    fn test_out_of_range_tile() {
        let result = StandardGrid.tile_bounds(TileAddress::new(2, 0, 1), "EPSG:3857");
        assert!(matches!(result, Err(CoordError::OutOfRange { .. })));

        let result = StandardGrid.tile_bounds(TileAddress::new(3, 2, 1), "EPSG:4326");
        assert!(matches!(result, Err(CoordError::OutOfRange { .. })));
    }

    #[test]
    fn test_unknown_projection() {
        let result = StandardGrid.tile_bounds(TileAddress::new(0, 0, 0), "EPSG:2056");
        assert!(matches!(result, Err(CoordError::UnsupportedProjection(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = StandardGrid.tile_bounds(TileAddress::new(0, 0, 31), "EPSG:3857");
        assert_eq!(result, Err(CoordError::InvalidZoom(31)));
    }

    #[test]
    fn test_trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn TileGrid>();
        let _grid: Arc<dyn TileGrid> = Arc::new(StandardGrid);
    }
}
