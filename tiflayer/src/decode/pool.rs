//! Worker pool for CPU-bound decode and extraction work.
//!
//! Wraps a rayon thread pool. Jobs submitted through [`DecodePool::run`]
//! report back to async callers through a oneshot channel, so the tokio
//! runtime never blocks on pixel work.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::error;

use crate::error::LayerError;

/// Shared rayon pool for decode and tile extraction.
///
/// Cloning is cheap; clones submit to the same threads.
#[derive(Debug, Clone)]
pub struct DecodePool {
    pool: Arc<rayon::ThreadPool>,
}

impl DecodePool {
    /// Build a pool with `threads` workers; `0` uses one per logical CPU.
    pub fn new(threads: usize) -> Result<Self, LayerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tiflayer-decode-{}", i))
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %message, "Decode worker panicked");
            })
            .build()
            .map_err(|e| LayerError::InvalidConfig(format!("Failed to build decode pool: {}", e)))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool and await its result.
    ///
    /// Resolves to `DecodeFailure` if the job panics.
    pub fn run<T, F>(&self, job: F) -> impl Future<Output = Result<T, LayerError>> + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            // The receiver is gone when the caller stopped waiting.
            let _ = tx.send(job());
        });
        async move {
            rx.await
                .map_err(|_| LayerError::DecodeFailure("Worker stopped before finishing".into()))
        }
    }

    /// Run `job` on the pool without waiting for it.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    /// Run `op` inside the pool, blocking the calling thread.
    pub fn install<T, F>(&self, op: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.pool.install(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_returns_result() {
        let pool = DecodePool::new(2).unwrap();
        assert_eq!(pool.threads(), 2);
        let value = pool.run(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_panicking_job_is_decode_failure() {
        let pool = DecodePool::new(1).unwrap();
        let result: Result<(), _> = pool.run(|| panic!("boom")).await;
        assert!(matches!(result, Err(LayerError::DecodeFailure(_))));

        // The pool survives the panic.
        assert_eq!(pool.run(|| 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_execute_runs_job() {
        let pool = DecodePool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        pool.execute(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never ran");
    }

    #[test]
    fn test_install_uses_pool_threads() {
        let pool = DecodePool::new(3).unwrap();
        let threads = pool.install(rayon::current_num_threads);
        assert_eq!(threads, 3);
    }
}
