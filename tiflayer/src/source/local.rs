//! Filesystem and in-memory fetchers.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use super::{BoxFuture, SourceFetcher};
use crate::error::LayerError;

/// Reads sources from the local filesystem.
///
/// Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl FileFetcher {
    fn path(url: &str) -> &str {
        url.strip_prefix("file://").unwrap_or(url)
    }
}

impl SourceFetcher for FileFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LayerError>> {
        Box::pin(async move {
            let path = Self::path(url);
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| LayerError::FetchFailure(format!("{}: {}", path, e)))?;
            debug!(path, bytes = data.len(), "Read source file");
            Ok(Bytes::from(data))
        })
    }
}

/// Serves sources registered in memory, keyed by URL.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    sources: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the bytes served for `url`.
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.sources.lock().insert(url.into(), data.into());
    }

    pub fn remove(&self, url: &str) -> Option<Bytes> {
        self.sources.lock().remove(url)
    }
}

impl SourceFetcher for MemoryFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, LayerError>> {
        let result = self
            .sources
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| LayerError::FetchFailure(format!("No source registered for {}", url)));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_fetcher_plain_path_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tif");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let plain = FileFetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(&plain[..], &[1, 2, 3]);

        let url = format!("file://{}", path.display());
        let via_url = FileFetcher.fetch(&url).await.unwrap();
        assert_eq!(plain, via_url);
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_file() {
        let result = FileFetcher.fetch("/definitely/not/here.tif").await;
        assert!(matches!(result, Err(LayerError::FetchFailure(_))));
    }

    #[tokio::test]
    async fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("mem://a", vec![9u8, 8]);

        let shared = fetcher.clone();
        assert_eq!(&shared.fetch("mem://a").await.unwrap()[..], &[9, 8]);
        assert!(shared.fetch("mem://b").await.is_err());

        fetcher.remove("mem://a");
        assert!(shared.fetch("mem://a").await.is_err());
    }
}
