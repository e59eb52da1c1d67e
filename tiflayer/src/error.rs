//! Layer-level error taxonomy.
//!
//! Every failure a layer can hit while resolving or decoding its source is
//! reported as a [`LayerError`]. These errors stay local to the layer: they
//! are logged, surfaced through [`LayerEvent::SourceFailed`](crate::layer::LayerEvent)
//! and never abort the host application.

use thiserror::Error;

use crate::geotiff::GeoTiffError;

/// Errors raised while bringing a source online.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    /// The image carries no usable geo keys or bounding box.
    #[error("Source has no georeference: {0}")]
    MissingGeoReference(String),

    /// The declared CRS is neither geographic (4326/4490) nor mercator (3857).
    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),

    /// Overview or full-resolution decode failed.
    #[error("Decode failed: {0}")]
    DecodeFailure(String),

    /// The source bytes could not be fetched.
    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    /// The work was superseded by a source switch.
    #[error("Cancelled by source switch")]
    Cancelled,

    /// The layer configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LayerError {
    /// Whether the source can never produce tiles.
    ///
    /// Unusable sources answer every tile request with a blank tile instead
    /// of leaving requests queued.
    pub fn is_unusable_source(&self) -> bool {
        matches!(
            self,
            LayerError::MissingGeoReference(_) | LayerError::UnsupportedProjection(_)
        )
    }
}

impl From<GeoTiffError> for LayerError {
    fn from(err: GeoTiffError) -> Self {
        match err {
            GeoTiffError::MissingGeoReference(msg) => LayerError::MissingGeoReference(msg),
            other => LayerError::DecodeFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_source_kinds() {
        assert!(LayerError::MissingGeoReference("x".into()).is_unusable_source());
        assert!(LayerError::UnsupportedProjection("EPSG:2056".into()).is_unusable_source());
        assert!(!LayerError::FetchFailure("404".into()).is_unusable_source());
        assert!(!LayerError::DecodeFailure("bad".into()).is_unusable_source());
        assert!(!LayerError::Cancelled.is_unusable_source());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            LayerError::UnsupportedProjection("EPSG:2056".into()).to_string(),
            "Unsupported projection: EPSG:2056"
        );
        assert_eq!(LayerError::Cancelled.to_string(), "Cancelled by source switch");
    }

    #[test]
    fn test_from_geotiff_error() {
        let err: LayerError = GeoTiffError::MissingGeoReference("no tiepoint".into()).into();
        assert_eq!(err, LayerError::MissingGeoReference("no tiepoint".into()));

        let err: LayerError = GeoTiffError::ImageIndex { index: 2, count: 1 }.into();
        assert!(matches!(err, LayerError::DecodeFailure(_)));
    }
}
