//! A bounded worker pool with an ordered `map`, used by the lifecycle
//! tasks (C10) to fan out per-proxy rechecks without serializing them.
//!
//! Unlike a native OS thread pool, the workload here is I/O-bound (TCP
//! connects, HTTP requests), so "worker" means a permit on a
//! [`tokio::sync::Semaphore`] rather than a dedicated OS thread — the
//! same effect (bounded concurrency, ordered results) without the
//! overhead of blocking threads for what is mostly waiting on sockets.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `f` over `items` with at most `workers` in flight at once.
///
/// Returns a result vector of the same length and order as `items`.
/// Completion order is unspecified — work is tagged with its input index
/// on spawn and results are written back by that index — but a task that
/// panics leaves `None` in its slot instead of poisoning the others.
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1) }
    }

    pub async fn map<T, R, F, Fut>(&self, items: Vec<T>, f: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let len = items.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let f = Arc::new(f);
        let mut set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let f = f.clone();
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("pool semaphore is never closed while map is running");
                (index, f(item).await)
            });
        }

        let mut results: Vec<Option<R>> = (0..len).map(|_| None).collect();
        while let Some(outcome) = set.join_next().await {
            if let Ok((index, value)) = outcome {
                results[index] = Some(value);
            }
            // A `JoinError` means the task panicked or was cancelled; the
            // slot stays `None`, matching the source pool's "a worker that
            // raises records null and continues" contract.
        }
        results
    }
}
