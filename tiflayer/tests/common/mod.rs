//! Shared fixtures for layer integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tiff::encoder::colortype::RGB8;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tokio::sync::{broadcast, Notify};

use tiflayer::coord::{BoundingBox, CoordError, StandardGrid, TileAddress, TileGrid};
use tiflayer::source::{BoxFuture, MemoryFetcher, SourceFetcher};
use tiflayer::{LayerError, LayerEvent};

pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// Full-resolution image size of the fixtures.
pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 4;

/// Geographic tile (z=1, x=2, y=0) covering lon 0..90, lat 0..90.
///
/// The fixtures cover lon 0..90, lat 0..45, i.e. the bottom half of it.
pub const NE_TILE: TileAddress = TileAddress { x: 2, y: 0, z: 1 };

/// Geographic tile (z=1, x=0, y=1) covering lon -180..-90, lat -90..0.
pub const SW_TILE: TileAddress = TileAddress { x: 0, y: 1, z: 1 };

pub const GEOGRAPHIC: &str = "EPSG:4326";

/// Route layer logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// GeoTIFF Writers
// ============================================================================

/// Description of a fixture GeoTIFF.
pub struct Fixture {
    pub full: [u8; 3],
    pub overview: Option<[u8; 3]>,
    /// `(model type, key, code)` geo key, or `None` for a plain TIFF.
    pub geo_key: Option<(u16, u16, u16)>,
}

impl Fixture {
    /// EPSG:4326 image with a 2x1 overview.
    pub fn with_overview(full: [u8; 3], overview: [u8; 3]) -> Self {
        Self {
            full,
            overview: Some(overview),
            geo_key: Some((2, 2048, 4326)),
        }
    }

    /// EPSG:4326 image without overviews.
    pub fn single(full: [u8; 3]) -> Self {
        Self {
            full,
            overview: None,
            geo_key: Some((2, 2048, 4326)),
        }
    }

    /// Image in UTM zone 33N.
    pub fn utm() -> Self {
        Self {
            full: RED,
            overview: None,
            geo_key: Some((1, 3072, 32633)),
        }
    }

    /// Image without any georeference.
    pub fn plain() -> Self {
        Self {
            full: RED,
            overview: None,
            geo_key: None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();

        let data = solid(WIDTH, HEIGHT, self.full);
        let mut image = encoder.new_image::<RGB8>(WIDTH, HEIGHT).unwrap();
        if let Some((model, key, code)) = self.geo_key {
            // 11.25 degrees per pixel from (0, 45).
            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[11.25f64, 11.25, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 0.0, 45.0, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(
                    Tag::GeoKeyDirectoryTag,
                    &[1u16, 1, 0, 2, 1024, 0, 1, model, key, 0, 1, code][..],
                )
                .unwrap();
        }
        image.write_data(&data).unwrap();

        if let Some(color) = self.overview {
            let mut image = encoder.new_image::<RGB8>(2, 1).unwrap();
            image.encoder().write_tag(Tag::NewSubfileType, 1u32).unwrap();
            image.write_data(&solid(2, 1, color)).unwrap();
        }

        Bytes::from(buf.into_inner())
    }
}

/// `StripOffsets`
const TAG_STRIP_OFFSETS: u16 = 273;

/// Point the full-resolution strip past the end of the file.
///
/// The overview stays readable, so only the full-resolution decode fails.
pub fn break_full_resolution_strip(data: &[u8]) -> Bytes {
    let mut data = data.to_vec();
    let u16_at = |data: &[u8], at: usize| u16::from_le_bytes([data[at], data[at + 1]]);
    let ifd = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;

    for i in 0..usize::from(u16_at(&data, ifd)) {
        let entry = ifd + 2 + i * 12;
        if u16_at(&data, entry) != TAG_STRIP_OFFSETS {
            continue;
        }
        let count = u32::from_le_bytes([
            data[entry + 4],
            data[entry + 5],
            data[entry + 6],
            data[entry + 7],
        ]);
        assert_eq!(count, 1, "fixture is written as a single strip");
        // SHORT (3) or LONG (4), stored inline.
        match u16_at(&data, entry + 2) {
            3 => data[entry + 8..entry + 10].copy_from_slice(&0xfff0u16.to_le_bytes()),
            _ => data[entry + 8..entry + 12].copy_from_slice(&0x7fff_fff0u32.to_le_bytes()),
        }
        return Bytes::from(data);
    }
    panic!("first image has no StripOffsets");
}

fn solid(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    color
        .iter()
        .copied()
        .cycle()
        .take((width * height * 3) as usize)
        .collect()
}

// ============================================================================
// Collaborators
// ============================================================================

/// Fetcher that holds back one URL until released.
pub struct GatedFetcher {
    pub inner: MemoryFetcher,
    gated: String,
    gate: Arc<Notify>,
}

impl GatedFetcher {
    pub fn new(inner: MemoryFetcher, gated: impl Into<String>) -> Self {
        Self {
            inner,
            gated: gated.into(),
            gate: Arc::new(Notify::new()),
        }
    }

    /// Let the held-back fetch complete.
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

impl SourceFetcher for GatedFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LayerError>> {
        Box::pin(async move {
            if url == self.gated {
                self.gate.notified().await;
            }
            self.inner.fetch(url).await
        })
    }
}

/// Standard grid that records the order tiles are extracted in.
#[derive(Default)]
pub struct RecordingGrid {
    seen: Mutex<Vec<TileAddress>>,
}

impl RecordingGrid {
    pub fn seen(&self) -> Vec<TileAddress> {
        self.seen.lock().clone()
    }
}

impl TileGrid for RecordingGrid {
    fn tile_bounds(
        &self,
        address: TileAddress,
        projection_code: &str,
    ) -> Result<BoundingBox, CoordError> {
        self.seen.lock().push(address);
        StandardGrid.tile_bounds(address, projection_code)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Wait for the next layer event.
pub async fn next_event(events: &mut broadcast::Receiver<LayerEvent>) -> LayerEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for a layer event")
        .expect("layer event channel closed")
}

/// Assert that no event arrives within a short window.
pub async fn assert_quiet(events: &mut broadcast::Receiver<LayerEvent>) {
    let result = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
    assert!(result.is_err(), "unexpected layer event: {:?}", result);
}
