//! Tile request types.
//!
//! A [`TileRequest`] pairs a tile address and the requesting map's
//! projection with a one-shot responder. The layer consumes each request
//! exactly once: it either answers it or drops it, and a dropped responder
//! is seen by the requester as [`TileError::Cancelled`].

use tokio::sync::oneshot;

use super::{TileError, TileImage};
use crate::coord::{CoordError, TileAddress};

/// Outcome delivered to a tile requester.
pub type TileResult = Result<TileImage, TileError>;

/// Request for one tile.
///
/// # Example
///
/// ```
/// use tiflayer::coord::TileAddress;
/// use tiflayer::tile::TileRequest;
///
/// let (request, _response) = TileRequest::new(TileAddress::new(3, 5, 4), "EPSG:3857");
/// assert_eq!(request.address(), TileAddress::new(3, 5, 4));
/// assert_eq!(request.projection(), "EPSG:3857");
/// ```
#[derive(Debug)]
pub struct TileRequest {
    address: TileAddress,
    projection: String,
    responder: oneshot::Sender<TileResult>,
}

/// Receiving side of a tile request.
pub type TileResponse = oneshot::Receiver<TileResult>;

impl TileRequest {
    /// Create a request and the receiver its result will arrive on.
    pub fn new(address: TileAddress, projection: impl Into<String>) -> (Self, TileResponse) {
        let (responder, response) = oneshot::channel();
        (
            Self {
                address,
                projection: projection.into(),
                responder,
            },
            response,
        )
    }

    /// Create a request from a tile URL carrying `x`, `y` and `z` query
    /// parameters, e.g. `./tile?x=3&y=5&z=4`.
    pub fn from_url(
        url: &str,
        projection: impl Into<String>,
    ) -> Result<(Self, TileResponse), CoordError> {
        let address = TileAddress::from_url(url)?;
        Ok(Self::new(address, projection))
    }

    pub fn address(&self) -> TileAddress {
        self.address
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }

    /// Whether the requester stopped waiting.
    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }

    /// Deliver the result, consuming the request.
    ///
    /// A requester that stopped waiting is ignored.
    pub fn respond(self, result: TileResult) {
        let _ = self.responder.send(result);
    }
}
