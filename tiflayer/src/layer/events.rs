//! Notifications published by a layer.

use std::sync::Arc;

use crate::decode::{DecodedSurface, ResolutionLevel};
use crate::error::LayerError;
use crate::georef::RasterSource;

/// Capacity of the layer event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event broadcast to layer subscribers.
///
/// Every event carries the generation it belongs to, so a subscriber that
/// lags behind a source switch can discard stale ones.
#[derive(Debug, Clone)]
pub enum LayerEvent {
    /// The first surface of a source is published and tiles can be served.
    SourceReady {
        generation: u64,
        source: Arc<RasterSource>,
        /// The first surface; `level` is `Full` for single-image sources.
        surface: Arc<DecodedSurface>,
        level: ResolutionLevel,
    },
    /// The full-resolution surface replaced the preview.
    ///
    /// Tiles produced earlier for this generation should be re-requested.
    CacheInvalidate { generation: u64 },
    /// The source could not be loaded.
    SourceFailed { generation: u64, error: LayerError },
}

impl LayerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LayerEvent::SourceReady { generation, .. }
            | LayerEvent::CacheInvalidate { generation }
            | LayerEvent::SourceFailed { generation, .. } => *generation,
        }
    }
}
