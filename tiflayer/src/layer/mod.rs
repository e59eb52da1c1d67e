//! The tile layer: source lifecycle, staged decoding and tile serving.
//!
//! A [`TifLayer`] owns one GeoTIFF source at a time. Loading a source runs
//! in stages so the map can show something quickly:
//!
//! 1. **Resolve**: fetch the bytes, read the georeference and bounds.
//! 2. **Preview**: decode the coarsest overview and start serving tiles.
//!    Requests that arrived earlier are replayed in arrival order.
//! 3. **Full**: when the viewport settles, decode the full-resolution image,
//!    swap it in and broadcast [`LayerEvent::CacheInvalidate`].
//!
//! Switching the source cancels everything issued for the old one. Each
//! source gets a new generation number and every asynchronous continuation
//! checks it before touching state, so a late result from an old source is
//! discarded instead of published.
//!
//! # Example
//!
//! ```ignore
//! use tiflayer::config::LayerConfig;
//! use tiflayer::coord::TileAddress;
//! use tiflayer::layer::TifLayer;
//!
//! let layer = TifLayer::new(LayerConfig::new().with_source_url("wind.tif"))?;
//! layer.start();
//! let tile = layer.request_tile(TileAddress::new(0, 0, 1), "EPSG:3857").await?;
//! layer.viewport_settled();
//! ```

mod events;
mod state;

pub use events::{LayerEvent, EVENT_CHANNEL_CAPACITY};
pub use state::{LayerPhase, LayerState};

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::color::{ColorMapper, PassthroughMapper};
use crate::config::LayerConfig;
use crate::coord::{StandardGrid, TileAddress, TileGrid};
use crate::decode::{decode_image, DecodeOptions, DecodePool, DecodedSurface};
use crate::error::LayerError;
use crate::geotiff::GeoTiff;
use crate::georef::{self, RasterSource};
use crate::source::{DefaultFetcher, SourceFetcher};
use crate::tile::{
    ScratchPool, TileError, TileExtractor, TileImage, TilePostProcessor, TileRequest, TileResult,
};
use state::{FullDecodeJob, Route};

/// Builder for [`TifLayer`] with injectable collaborators.
pub struct TifLayerBuilder {
    config: LayerConfig,
    fetcher: Option<Arc<dyn SourceFetcher>>,
    mapper: Option<Arc<dyn ColorMapper>>,
    grid: Option<Arc<dyn TileGrid>>,
    pool: Option<DecodePool>,
    runtime: Option<Handle>,
    post_processor: Option<Arc<dyn TilePostProcessor>>,
}

impl TifLayerBuilder {
    pub fn new(config: LayerConfig) -> Self {
        Self {
            config,
            fetcher: None,
            mapper: None,
            grid: None,
            pool: None,
            runtime: None,
            post_processor: None,
        }
    }

    /// Fetcher for source bytes. Default: HTTP and local files by scheme.
    pub fn fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sample-to-color mapping. Default: band passthrough.
    pub fn mapper(mut self, mapper: Arc<dyn ColorMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Tiling grid. Default: [`StandardGrid`].
    pub fn grid(mut self, grid: Arc<dyn TileGrid>) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Worker pool, e.g. to share one between layers.
    pub fn pool(mut self, pool: DecodePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Runtime to spawn loading tasks on. Default: the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Hook applied to every tile before delivery. Default: none.
    pub fn post_processor(mut self, processor: Arc<dyn TilePostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    /// Build the layer. It stays idle until a source is set.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the configuration does not validate, no runtime
    /// is available, or the worker pool cannot be created.
    pub fn build(self) -> Result<TifLayer, LayerError> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| LayerError::InvalidConfig(e.to_string()))?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| LayerError::InvalidConfig(format!("No tokio runtime: {}", e)))?,
        };
        let fetcher: Arc<dyn SourceFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(DefaultFetcher::new()?),
        };
        let mapper = self
            .mapper
            .unwrap_or_else(|| Arc::new(PassthroughMapper) as Arc<dyn ColorMapper>);
        let grid = self
            .grid
            .unwrap_or_else(|| Arc::new(StandardGrid) as Arc<dyn TileGrid>);
        let pool = match self.pool {
            Some(pool) => pool,
            None => DecodePool::new(config.decode_threads)?,
        };

        let extractor = TileExtractor::new(
            grid,
            ScratchPool::new(config.tile_size),
            config.output_format,
            config.quality,
            config.resampling,
        )
        .map_err(|e| LayerError::InvalidConfig(e.to_string()))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        debug!(
            tile_size = config.tile_size,
            format = %config.output_format,
            threads = pool.threads(),
            "Layer created"
        );

        Ok(TifLayer {
            inner: Arc::new(Inner {
                options: config.decode_options(),
                config,
                fetcher,
                mapper,
                pool,
                extractor: Arc::new(extractor),
                runtime,
                post_processor: self.post_processor,
                state: Mutex::new(LayerState::new()),
                events,
            }),
        })
    }
}

/// A GeoTIFF-backed tile layer.
///
/// Cloning is cheap; clones share the same source and state.
#[derive(Clone)]
pub struct TifLayer {
    inner: Arc<Inner>,
}

impl fmt::Debug for TifLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TifLayer")
            .field("generation", &state.generation())
            .field("phase", &state.phase())
            .field("pending", &state.pending_len())
            .finish()
    }
}

impl TifLayer {
    /// Create a layer with default collaborators.
    pub fn new(config: LayerConfig) -> Result<Self, LayerError> {
        TifLayerBuilder::new(config).build()
    }

    pub fn builder(config: LayerConfig) -> TifLayerBuilder {
        TifLayerBuilder::new(config)
    }

    pub fn config(&self) -> &LayerConfig {
        &self.inner.config
    }

    /// Subscribe to layer events. Events sent before subscribing are missed.
    pub fn subscribe(&self) -> broadcast::Receiver<LayerEvent> {
        self.inner.events.subscribe()
    }

    pub fn phase(&self) -> LayerPhase {
        self.inner.state.lock().phase()
    }

    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation()
    }

    /// The resolved source, once the first surface is published.
    pub fn source(&self) -> Option<Arc<RasterSource>> {
        self.inner.state.lock().source()
    }

    /// The surface tiles are currently cut from.
    pub fn surface(&self) -> Option<Arc<DecodedSurface>> {
        self.inner.state.lock().surface()
    }

    /// Requests waiting for the first surface.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending_len()
    }

    pub fn tile_size(&self) -> u32 {
        self.inner.extractor.tile_size()
    }

    /// Load the configured source, if any. Returns its generation.
    pub fn start(&self) -> Option<u64> {
        let url = self.inner.config.source_url.clone()?;
        Some(self.set_source_url(url))
    }

    /// Replace the source.
    ///
    /// Cancels pending fetches and decodes of the previous source and
    /// drops its queued requests, whose requesters see
    /// [`TileError::Cancelled`]. Returns the new generation.
    pub fn set_source_url(&self, url: impl Into<String>) -> u64 {
        let url = url.into();
        let (generation, cancel) = self.inner.state.lock().switch_source();
        info!(generation, url = %url, "Source set");

        let inner = Arc::clone(&self.inner);
        self.inner
            .runtime
            .spawn(inner.load_source(generation, url, cancel));
        generation
    }

    /// Accept a tile request.
    ///
    /// Before the first surface is published the request is queued; after
    /// that it is extracted on the worker pool. Requests against an
    /// unusable source are answered with the blank tile.
    pub fn load_tile(&self, request: TileRequest) {
        let address = request.address();
        let route = self.inner.state.lock().route(request);
        if let Route::Queued = route {
            debug!(tile = %address, "Tile queued until source is ready");
        }
        self.inner.dispatch(route);
    }

    /// Request a tile and wait for it.
    pub async fn request_tile(&self, address: TileAddress, projection: &str) -> TileResult {
        let (request, response) = TileRequest::new(address, projection);
        self.load_tile(request);
        response.await.unwrap_or(Err(TileError::Cancelled))
    }

    /// Signal that the map stopped moving.
    ///
    /// Starts the full-resolution decode the first time it is called while
    /// a preview is showing. Returns whether a decode was started.
    pub fn viewport_settled(&self) -> bool {
        let job = self.inner.state.lock().start_full_decode();
        match job {
            Some(job) => {
                let inner = Arc::clone(&self.inner);
                self.inner.runtime.spawn(inner.load_full(job));
                true
            }
            None => false,
        }
    }
}

// ==================== Loading ====================

struct Inner {
    config: LayerConfig,
    options: DecodeOptions,
    fetcher: Arc<dyn SourceFetcher>,
    mapper: Arc<dyn ColorMapper>,
    pool: DecodePool,
    extractor: Arc<TileExtractor>,
    runtime: Handle,
    post_processor: Option<Arc<dyn TilePostProcessor>>,
    state: Mutex<LayerState>,
    events: broadcast::Sender<LayerEvent>,
}

/// A parsed source with its preview surface.
struct OpenedSource {
    geotiff: GeoTiff,
    source: RasterSource,
    surface: DecodedSurface,
}

/// Parse, resolve and decode the preview. Runs on the worker pool.
fn open_source(
    url: String,
    data: Bytes,
    mapper: &dyn ColorMapper,
    options: &DecodeOptions,
) -> Result<OpenedSource, LayerError> {
    let geotiff = GeoTiff::parse(data)?;
    let bounds = georef::resolve(&geotiff.georeference()?)?;
    let source = RasterSource::new(
        url,
        geotiff.width(),
        geotiff.height(),
        bounds,
        geotiff.image_count(),
        geotiff.band_count(),
    );
    let surface = decode_image(&geotiff, geotiff.coarsest_image_index(), mapper, options)?;
    Ok(OpenedSource {
        geotiff,
        source,
        surface,
    })
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().is_current(generation)
    }

    fn notify(&self, event: LayerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn load_source(self: Arc<Self>, generation: u64, url: String, cancel: CancellationToken) {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "Fetch cancelled");
                return;
            }
            result = self.fetcher.fetch(&url) => result,
        };
        let data = match fetched {
            Ok(data) => data,
            Err(e) => return self.fail(generation, e),
        };
        debug!(generation, bytes = data.len(), "Source fetched");

        let mapper = Arc::clone(&self.mapper);
        let options = self.options;
        let job = self
            .pool
            .run(move || open_source(url, data, mapper.as_ref(), &options));
        let opened = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "Preview decode cancelled");
                return;
            }
            result = job => result.and_then(|opened| opened),
        };

        match opened {
            Ok(opened) => self.publish_preview(generation, opened),
            Err(e) => self.fail(generation, e),
        }
    }

    fn publish_preview(self: &Arc<Self>, generation: u64, opened: OpenedSource) {
        let source = Arc::new(opened.source);
        let surface = Arc::new(opened.surface);
        let level = surface.level();

        let drained = self.state.lock().publish_preview(
            generation,
            Arc::clone(&source),
            Arc::new(opened.geotiff),
            Arc::clone(&surface),
        );
        let requests = match drained {
            Some(requests) => requests,
            None => {
                debug!(generation, "Discarding preview of superseded source");
                return;
            }
        };

        info!(
            generation,
            source = %source,
            level = %level,
            surface_width = surface.width(),
            surface_height = surface.height(),
            replayed = requests.len(),
            "Source ready"
        );
        self.notify(LayerEvent::SourceReady {
            generation,
            source: Arc::clone(&source),
            surface: Arc::clone(&surface),
            level,
        });

        if !requests.is_empty() {
            let inner = Arc::clone(self);
            self.pool.execute(move || {
                for request in requests {
                    inner.serve(generation, &source, &surface, request);
                }
            });
        }
    }

    fn fail(self: &Arc<Self>, generation: u64, error: LayerError) {
        let unusable = error.is_unusable_source();
        let blanks = {
            let mut state = self.state.lock();
            if unusable {
                match state.mark_unusable(generation) {
                    Some(requests) => requests,
                    None => return,
                }
            } else if state.mark_failed(generation) {
                Vec::new()
            } else {
                return;
            }
        };

        if unusable {
            warn!(
                generation,
                error = %error,
                blanked = blanks.len(),
                "Source unusable, serving blank tiles"
            );
        } else {
            error!(generation, error = %error, "Source failed to load");
        }
        for request in blanks {
            self.respond_blank(request);
        }
        self.notify(LayerEvent::SourceFailed { generation, error });
    }

    async fn load_full(self: Arc<Self>, job: FullDecodeJob) {
        let FullDecodeJob {
            generation,
            geotiff,
            cancel,
        } = job;
        info!(
            generation,
            width = geotiff.width(),
            height = geotiff.height(),
            "Decoding full resolution"
        );

        let mapper = Arc::clone(&self.mapper);
        let options = self.options;
        let decode = self
            .pool
            .run(move || decode_image(&geotiff, 0, mapper.as_ref(), &options));
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "Full-resolution decode cancelled");
                return;
            }
            result = decode => result.and_then(|surface| surface),
        };

        match result {
            Ok(surface) => {
                let swapped = self
                    .state
                    .lock()
                    .publish_full(generation, Arc::new(surface));
                if swapped {
                    info!(generation, "Full resolution ready");
                    self.notify(LayerEvent::CacheInvalidate { generation });
                } else {
                    debug!(generation, "Discarding full resolution of superseded source");
                }
            }
            Err(e) => {
                warn!(generation, error = %e, "Full-resolution decode failed, keeping preview");
            }
        }
    }

    // ==================== Serving ====================

    fn dispatch(self: &Arc<Self>, route: Route) {
        match route {
            Route::Queued => {}
            Route::Blank(request) => self.respond_blank(request),
            Route::Serve {
                generation,
                source,
                surface,
                request,
            } => {
                let inner = Arc::clone(self);
                self.pool
                    .execute(move || inner.serve(generation, &source, &surface, request));
            }
        }
    }

    /// Extract one tile. Runs on the worker pool.
    ///
    /// A request whose generation was superseded is dropped, which its
    /// requester sees as cancellation.
    fn serve(
        &self,
        generation: u64,
        source: &RasterSource,
        surface: &DecodedSurface,
        request: TileRequest,
    ) {
        if request.is_abandoned() || !self.is_current(generation) {
            return;
        }
        let address = request.address();
        let result = self
            .extractor
            .extract(address, request.projection(), source, surface)
            .and_then(|tile| self.post_process(address, tile));
        if let Err(e) = &result {
            warn!(generation, tile = %address, error = %e, "Tile extraction failed");
        }
        if self.is_current(generation) {
            request.respond(result);
        }
    }

    /// Answer with the blank tile, through the post-processor if one is set.
    fn respond_blank(self: &Arc<Self>, request: TileRequest) {
        if self.post_processor.is_none() {
            request.respond(Ok(self.extractor.blank()));
            return;
        }
        let inner = Arc::clone(self);
        self.pool.execute(move || {
            let result = inner.post_process(request.address(), inner.extractor.blank());
            request.respond(result);
        });
    }

    fn post_process(&self, address: TileAddress, tile: TileImage) -> TileResult {
        match &self.post_processor {
            Some(processor) => processor.process(address, tile),
            None => Ok(tile),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryFetcher;

    #[test]
    fn test_build_requires_runtime() {
        let result = TifLayer::builder(LayerConfig::new())
            .fetcher(Arc::new(MemoryFetcher::new()))
            .build();
        assert!(matches!(result, Err(LayerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let result = TifLayer::builder(LayerConfig::new().with_tile_size(0))
            .fetcher(Arc::new(MemoryFetcher::new()))
            .build();
        assert!(matches!(result, Err(LayerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_new_layer_is_idle() {
        let layer = TifLayer::builder(LayerConfig::new().with_tile_size(64))
            .fetcher(Arc::new(MemoryFetcher::new()))
            .build()
            .unwrap();
        assert_eq!(layer.phase(), LayerPhase::Idle);
        assert_eq!(layer.generation(), 0);
        assert_eq!(layer.tile_size(), 64);
        assert!(layer.start().is_none());
        assert!(!layer.viewport_settled());
    }

    #[tokio::test]
    async fn test_idle_layer_queues_requests() {
        let layer = TifLayer::builder(LayerConfig::new())
            .fetcher(Arc::new(MemoryFetcher::new()))
            .build()
            .unwrap();
        let (request, _response) = TileRequest::new(TileAddress::new(0, 0, 0), "EPSG:3857");
        layer.load_tile(request);
        assert_eq!(layer.pending_len(), 1);
    }
}
