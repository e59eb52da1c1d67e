//! Host hook for rewriting tiles before delivery.

use super::{TileError, TileImage};
use crate::coord::TileAddress;

/// Rewrites every produced tile before it reaches the requester, e.g. to
/// stamp it or re-encode it for the host renderer.
///
/// Runs on the worker pool for each successfully produced tile, blank tiles
/// included. An error replaces the tile as the request's result.
///
/// Closures with the matching signature implement the trait:
///
/// ```
/// use std::sync::Arc;
/// use tiflayer::coord::TileAddress;
/// use tiflayer::tile::{TileError, TileImage, TilePostProcessor};
///
/// let passthrough: Arc<dyn TilePostProcessor> =
///     Arc::new(|_: TileAddress, tile: TileImage| Ok::<_, TileError>(tile));
/// ```
pub trait TilePostProcessor: Send + Sync {
    fn process(&self, address: TileAddress, tile: TileImage) -> Result<TileImage, TileError>;
}

impl<F> TilePostProcessor for F
where
    F: Fn(TileAddress, TileImage) -> Result<TileImage, TileError> + Send + Sync,
{
    fn process(&self, address: TileAddress, tile: TileImage) -> Result<TileImage, TileError> {
        self(address, tile)
    }
}
