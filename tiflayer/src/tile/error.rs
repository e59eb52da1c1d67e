//! Error types for tile requests.

use std::fmt;

use crate::coord::CoordError;

/// Errors returned to the requester of a single tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileError {
    /// The requesting map's projection is neither 4326 nor 3857.
    UnsupportedProjection(String),
    /// The tiling grid rejected the address.
    Grid(CoordError),
    /// A scratch surface of the configured size could not be allocated.
    Surface { width: u32, height: u32 },
    /// Tile encoding failed.
    EncodingFailed(String),
    /// The request was dropped by a source switch before it was served.
    Cancelled,
}

impl fmt::Display for TileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileError::UnsupportedProjection(code) => {
                write!(f, "Unsupported projection: {} (only 4326/3857)", code)
            }
            TileError::Grid(err) => write!(f, "Tile grid error: {}", err),
            TileError::Surface { width, height } => {
                write!(f, "Failed to allocate {}×{} tile surface", width, height)
            }
            TileError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            TileError::Cancelled => write!(f, "Tile request cancelled"),
        }
    }
}

impl std::error::Error for TileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TileError::Grid(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoordError> for TileError {
    fn from(err: CoordError) -> Self {
        match err {
            CoordError::UnsupportedProjection(code) => TileError::UnsupportedProjection(code),
            other => TileError::Grid(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unsupported_projection() {
        let err = TileError::UnsupportedProjection("BAIDU".to_string());
        assert_eq!(err.to_string(), "Unsupported projection: BAIDU (only 4326/3857)");
    }

    #[test]
    fn test_display_surface() {
        let err = TileError::Surface {
            width: 0,
            height: 512,
        };
        assert_eq!(err.to_string(), "Failed to allocate 0×512 tile surface");
    }

    #[test]
    fn test_from_coord_error() {
        let err: TileError = CoordError::InvalidZoom(40).into();
        assert!(matches!(err, TileError::Grid(CoordError::InvalidZoom(40))));

        let err: TileError = CoordError::UnsupportedProjection("EPSG:2056".into()).into();
        assert_eq!(err, TileError::UnsupportedProjection("EPSG:2056".into()));
    }

    #[test]
    fn test_error_source() {
        use std::error::Error;
        let err = TileError::Grid(CoordError::InvalidZoom(40));
        assert!(err.source().is_some());
        assert!(TileError::Cancelled.source().is_none());
    }
}
