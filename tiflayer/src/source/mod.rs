//! Source byte fetching.
//!
//! The layer never reads the network or disk itself; it asks a
//! [`SourceFetcher`] for the complete bytes of a GeoTIFF. Fetchers are
//! dyn-compatible so the layer can hold any of them behind an `Arc`.
//!
//! | Fetcher            | Handles                                  |
//! |--------------------|------------------------------------------|
//! | [`HttpFetcher`]    | `http://`, `https://`                    |
//! | [`FileFetcher`]    | `file://` URLs and plain filesystem paths |
//! | [`MemoryFetcher`]  | anything registered in memory (tests)    |
//! | [`DefaultFetcher`] | dispatches to HTTP or file by scheme     |
//!
//! Cancellation is the caller's concern: the layer races every fetch
//! against its source's cancellation token and drops the future on switch.

mod http;
mod local;

pub use http::HttpFetcher;
pub use local::{FileFetcher, MemoryFetcher};

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::LayerError;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches the complete bytes behind a source URL.
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url`.
    ///
    /// # Errors
    ///
    /// `FetchFailure` describing the transport or I/O problem.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LayerError>>;
}

/// Scheme-dispatching fetcher used when none is injected.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Result<Self, LayerError> {
        Ok(Self {
            http: HttpFetcher::new()?,
            file: FileFetcher,
        })
    }
}

fn is_http(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl SourceFetcher for DefaultFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LayerError>> {
        if is_http(url) {
            self.http.fetch(url)
        } else {
            self.file.fetch(url)
        }
    }
}
