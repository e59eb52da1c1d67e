//! TifLayer - on-demand map tiles from a GeoTIFF
//!
//! This library turns a single GeoTIFF into a tile source for a slippy map.
//! The file is fetched once, its georeference is resolved to geographic and
//! web-mercator bounds, and tiles are cropped from an in-memory RGBA surface
//! as the map asks for them.
//!
//! # Architecture
//!
//! ```text
//!  SourceFetcher ──► GeoTiff ──► georef::resolve ──► RasterSource
//!                      │
//!                      └─► read_bands(i) ──► decode (ColorMapper) ──► DecodedSurface
//!                                                                       │
//!  TileRequest ──► TifLayer ──► PendingTileQueue / TileExtractor ◄──────┘
//!                                     │
//!                                     └─► TileImage (PNG / JPEG / RGBA)
//! ```
//!
//! - [`color`] maps raw band samples to colors (ramps, vector magnitude, passthrough)
//! - [`coord`] projects between EPSG:4326 and EPSG:3857 and computes tile bounds
//! - [`geotiff`] reads image geometry, overviews and georeference tags
//! - [`georef`] resolves a declared CRS to the bounds tiles are matched against
//! - [`decode`] colorizes bands into surfaces on a worker pool
//! - [`tile`] extracts, encodes and queues tiles
//! - [`layer`] ties it together and handles source switching
//! - [`config`] loads layer settings from INI files
//! - [`source`] fetches source bytes over HTTP or from disk

pub mod color;
pub mod config;
pub mod coord;
pub mod decode;
pub mod error;
pub mod geotiff;
pub mod georef;
pub mod layer;
pub mod source;
pub mod tile;

pub use config::LayerConfig;
pub use error::LayerError;
pub use layer::{LayerEvent, LayerPhase, TifLayer, TifLayerBuilder};
pub use tile::{TileError, TileImage, TileRequest};
