//! Coordinate value types: bounding boxes and tile addresses.

use std::fmt;

use thiserror::Error;

/// Maximum zoom level accepted for tile addresses.
pub const MAX_ZOOM: u8 = 30;

/// Errors raised while interpreting tile addresses or tiling schemes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Zoom level above [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (max {max})", max = MAX_ZOOM)]
    InvalidZoom(u8),

    /// Tile column or row outside the grid at this zoom.
    #[error("Tile {x}/{y} is outside the grid at zoom {z}")]
    OutOfRange { x: u32, y: u32, z: u8 },

    /// The tile URL does not carry a usable x/y/z query.
    #[error("Invalid tile URL '{0}': expected x, y and z query parameters")]
    InvalidTileUrl(String),

    /// The grid has no tiling scheme for this projection code.
    #[error("No tiling scheme for projection '{0}'")]
    UnsupportedProjection(String),
}

/// Axis-aligned rectangle `(xmin, ymin, xmax, ymax)` in a single CRS.
///
/// Y grows upward (north), as in both EPSG:4326 and EPSG:3857.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Build from `[xmin, ymin, xmax, ymax]`.
    pub const fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// The four corners, counter-clockwise from the lower-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.xmin, self.ymin),
            (self.xmax, self.ymin),
            (self.xmax, self.ymax),
            (self.xmin, self.ymax),
        ]
    }

    /// Smallest box containing all `points`, ignoring NaN coordinates.
    ///
    /// Returns `None` when no finite point remains.
    pub fn enclosing(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut bbox: Option<Self> = None;
        for (x, y) in points {
            if x.is_nan() || y.is_nan() {
                continue;
            }
            bbox = Some(match bbox {
                None => Self::new(x, y, x, y),
                Some(b) => Self::new(b.xmin.min(x), b.ymin.min(y), b.xmax.max(x), b.ymax.max(y)),
            });
        }
        bbox
    }

    /// Strict overlap test. Boxes that only share an edge or a corner do
    /// not intersect.
    #[inline]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Address of a tile in a standard XYZ pyramid.
///
/// `x` grows eastward and `y` grows southward from the top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileAddress {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Recover the address from a tile URL such as `./tile?x=3&y=5&z=4`.
    ///
    /// Only the `x`, `y` and `z` query parameters are read; relative URLs
    /// are accepted.
    pub fn from_url(url: &str) -> Result<Self, CoordError> {
        let invalid = || CoordError::InvalidTileUrl(url.to_string());

        let base = reqwest::Url::parse("http://localhost/").map_err(|_| invalid())?;
        let parsed = base.join(url).map_err(|_| invalid())?;

        let mut x = None;
        let mut y = None;
        let mut z = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "x" => x = value.parse::<u32>().ok(),
                "y" => y = value.parse::<u32>().ok(),
                "z" => z = value.parse::<u8>().ok(),
                _ => {}
            }
        }

        match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Ok(Self::new(x, y, z)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_intersects_shared_edge_is_not_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));

        let side = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&side));
    }

    #[test]
    fn test_intersects_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 20.0, 20.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn test_intersects_containment() {
        let outer = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
        let inner = BoundingBox::new(1.0, 1.0, 2.0, 2.0);
        assert!(outer.intersects(&inner));
        assert!(inner.intersects(&outer));
    }

    #[test]
    fn test_disjoint_with_gap() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(1.5, 0.0, 3.0, 1.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_enclosing_skips_nan() {
        let bbox =
            BoundingBox::enclosing([(1.0, 2.0), (f64::NAN, 0.0), (-3.0, 5.0)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-3.0, 2.0, 1.0, 5.0));
        assert!(BoundingBox::enclosing([(f64::NAN, f64::NAN)]).is_none());
    }

    #[test]
    fn test_array_conversion() {
        let bbox = BoundingBox::from_array([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bbox.to_array(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bbox.width(), 2.0);
        assert_eq!(bbox.height(), 2.0);
    }

    #[test]
    fn test_tile_address_from_relative_url() {
        let address = TileAddress::from_url("./hello?x=3&y=5&z=4").unwrap();
        assert_eq!(address, TileAddress::new(3, 5, 4));
    }

    #[test]
    fn test_tile_address_from_absolute_url() {
        let address =
            TileAddress::from_url("https://tiles.example.com/t?z=12&x=2048&y=1361&v=2").unwrap();
        assert_eq!(address, TileAddress::new(2048, 1361, 12));
    }

    #[test]
    fn test_tile_address_from_url_missing_param() {
        let result = TileAddress::from_url("./hello?x=3&y=5");
        assert!(matches!(result, Err(CoordError::InvalidTileUrl(_))));
    }

    #[test]
    fn test_tile_address_from_url_not_a_number() {
        let result = TileAddress::from_url("./hello?x=a&y=5&z=1");
        assert!(result.is_err());
    }

    #[test]
    fn test_tile_address_display() {
        assert_eq!(TileAddress::new(1, 2, 3).to_string(), "3/1/2");
    }

    fn bbox() -> impl Strategy<Value = BoundingBox> {
        (-100.0f64..100.0, -100.0f64..100.0, 0.0f64..50.0, 0.0f64..50.0)
            .prop_map(|(x, y, w, h)| BoundingBox::new(x, y, x + w, y + h))
    }

    proptest! {
        #[test]
        fn prop_intersects_is_symmetric(a in bbox(), b in bbox()) {
            prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        }
    }
}
