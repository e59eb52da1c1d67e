//! Mutable per-layer state and its transitions.
//!
//! All transitions run under the layer's mutex and take the generation the
//! caller was started with. A transition for a superseded generation is a
//! no-op, which is what keeps work issued against an old source from
//! touching the new one.
//!
//! ```text
//!   Idle ──set_source_url──► SourceResolving ──preview──► PreviewReady ──full──► FullReady
//!                                 │    │                      (single image) ──────┘
//!                                 │    └──fetch/decode error──► Failed
//!                                 └──no/unsupported georef──► Unusable
//! ```

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::decode::{DecodedSurface, ResolutionLevel};
use crate::geotiff::GeoTiff;
use crate::georef::RasterSource;
use crate::tile::{PendingTileQueue, TileRequest};

/// Lifecycle phase of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerPhase {
    /// No source set.
    Idle,
    /// Fetching, resolving or decoding the preview.
    SourceResolving,
    /// Serving tiles from the preview surface.
    PreviewReady,
    /// Serving tiles from the full-resolution surface.
    FullReady,
    /// The source has no usable georeference; every tile is blank.
    Unusable,
    /// Fetch or preview decode failed; requests stay queued.
    Failed,
}

impl LayerPhase {
    /// Whether a surface is available for extraction.
    pub fn is_ready(&self) -> bool {
        matches!(self, LayerPhase::PreviewReady | LayerPhase::FullReady)
    }
}

impl fmt::Display for LayerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerPhase::Idle => "idle",
            LayerPhase::SourceResolving => "resolving",
            LayerPhase::PreviewReady => "preview-ready",
            LayerPhase::FullReady => "full-ready",
            LayerPhase::Unusable => "unusable",
            LayerPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// What to do with an incoming tile request.
pub(crate) enum Route {
    /// Buffered until the first surface is published.
    Queued,
    /// Extract now from this generation's source and surface.
    Serve {
        generation: u64,
        source: Arc<RasterSource>,
        surface: Arc<DecodedSurface>,
        request: TileRequest,
    },
    /// Answer with the blank tile.
    Blank(TileRequest),
}

/// Full-resolution decode to run for a generation.
pub(crate) struct FullDecodeJob {
    pub generation: u64,
    pub geotiff: Arc<GeoTiff>,
    pub cancel: CancellationToken,
}

/// State of one layer.
#[derive(Debug)]
pub struct LayerState {
    generation: u64,
    phase: LayerPhase,
    source: Option<Arc<RasterSource>>,
    surface: Option<Arc<DecodedSurface>>,
    geotiff: Option<Arc<GeoTiff>>,
    pending: PendingTileQueue<TileRequest>,
    cancel: CancellationToken,
    full_decode_started: bool,
}

impl Default for LayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerState {
    pub fn new() -> Self {
        Self {
            generation: 0,
            phase: LayerPhase::Idle,
            source: None,
            surface: None,
            geotiff: None,
            pending: PendingTileQueue::new(),
            cancel: CancellationToken::new(),
            full_decode_started: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> LayerPhase {
        self.phase
    }

    pub fn source(&self) -> Option<Arc<RasterSource>> {
        self.source.clone()
    }

    pub fn surface(&self) -> Option<Arc<DecodedSurface>> {
        self.surface.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Cancel everything issued for the current source and start a new
    /// generation.
    ///
    /// Queued requests are dropped, which their requesters observe as
    /// cancellation.
    pub(crate) fn switch_source(&mut self) -> (u64, CancellationToken) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
        self.phase = LayerPhase::SourceResolving;
        self.source = None;
        self.surface = None;
        self.geotiff = None;
        self.pending.reset();
        self.full_decode_started = false;
        (self.generation, self.cancel.clone())
    }

    /// Decide how to handle `request` in the current phase.
    pub(crate) fn route(&mut self, request: TileRequest) -> Route {
        match self.phase {
            LayerPhase::PreviewReady | LayerPhase::FullReady => {
                match (&self.source, &self.surface) {
                    (Some(source), Some(surface)) => Route::Serve {
                        generation: self.generation,
                        source: Arc::clone(source),
                        surface: Arc::clone(surface),
                        request,
                    },
                    _ => Route::Blank(request),
                }
            }
            LayerPhase::Unusable => Route::Blank(request),
            LayerPhase::Idle | LayerPhase::SourceResolving | LayerPhase::Failed => {
                match self.pending.push(request) {
                    Ok(()) => Route::Queued,
                    Err((_, request)) => Route::Blank(request),
                }
            }
        }
    }

    /// Publish the first surface of `generation` and drain the queue.
    ///
    /// Returns the queued requests in arrival order, or `None` when the
    /// generation is stale.
    pub(crate) fn publish_preview(
        &mut self,
        generation: u64,
        source: Arc<RasterSource>,
        geotiff: Arc<GeoTiff>,
        surface: Arc<DecodedSurface>,
    ) -> Option<Vec<TileRequest>> {
        if !self.is_current(generation) || self.phase != LayerPhase::SourceResolving {
            return None;
        }
        self.phase = match surface.level() {
            ResolutionLevel::Preview => LayerPhase::PreviewReady,
            ResolutionLevel::Full => LayerPhase::FullReady,
        };
        self.source = Some(source);
        self.geotiff = Some(geotiff);
        self.surface = Some(surface);
        Some(self.drain())
    }

    /// Claim the full-resolution decode for the current generation.
    ///
    /// Returns `None` unless a preview is showing and no full decode was
    /// started yet.
    pub(crate) fn start_full_decode(&mut self) -> Option<FullDecodeJob> {
        if self.phase != LayerPhase::PreviewReady || self.full_decode_started {
            return None;
        }
        let geotiff = Arc::clone(self.geotiff.as_ref()?);
        self.full_decode_started = true;
        Some(FullDecodeJob {
            generation: self.generation,
            geotiff,
            cancel: self.cancel.clone(),
        })
    }

    /// Replace the preview with the full-resolution surface.
    ///
    /// Returns whether the swap happened.
    pub(crate) fn publish_full(&mut self, generation: u64, surface: Arc<DecodedSurface>) -> bool {
        if !self.is_current(generation) || self.phase != LayerPhase::PreviewReady {
            return false;
        }
        self.surface = Some(surface);
        self.phase = LayerPhase::FullReady;
        true
    }

    /// Mark the source unusable and drain the queue for blank answers.
    pub(crate) fn mark_unusable(&mut self, generation: u64) -> Option<Vec<TileRequest>> {
        if !self.is_current(generation) {
            return None;
        }
        self.phase = LayerPhase::Unusable;
        Some(self.drain())
    }

    /// Mark the source failed. Queued requests stay queued.
    pub(crate) fn mark_failed(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.phase = LayerPhase::Failed;
        true
    }

    fn drain(&mut self) -> Vec<TileRequest> {
        let mut drained = Vec::with_capacity(self.pending.len());
        // A second drain for one generation cannot happen: every caller
        // leaves SourceResolving first.
        let _ = self.pending.drain_into(|request| drained.push(request));
        drained
    }
}
