//! Tile extraction and request handling.
//!
//! - [`TileExtractor`] crops tiles out of the current decoded surface
//! - [`PendingTileQueue`] holds requests that arrive before the first surface
//! - [`TileRequest`] carries an address, a projection and a one-shot responder
//! - [`ScratchPool`] lends tile-sized pixmaps to extractions
//! - [`TilePostProcessor`] lets the host rewrite tiles before delivery

mod error;
mod extractor;
mod output;
mod pending;
mod postprocess;
mod request;
mod scratch;

pub use error::TileError;
pub use extractor::{pixel_rect, PixelRect, Resampling, TileExtractor, DEGENERATE_EPSILON};
pub use output::{TileFormat, TileImage};
pub use pending::{PendingTileQueue, QueueError};
pub use postprocess::TilePostProcessor;
pub use request::{TileRequest, TileResponse, TileResult};
pub use scratch::{ScratchPool, ScratchSurface};

/// Default edge length of a tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;
