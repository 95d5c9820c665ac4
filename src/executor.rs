use rayon::prelude::*;
use tracing::warn;

use crate::partition::split_into_chunks;

/// Runs units of work either inline or on a bounded rayon pool.
pub enum Executor {
    Sequential,
    Pool {
        pool: rayon::ThreadPool,
        threads: usize,
    },
}

impl Executor {
    /// `None` runs sequentially. A pool that fails to build falls back to sequential.
    pub fn new(threads: Option<usize>) -> Self {
        let Some(threads) = threads.map(|n| n.max(1)) else {
            return Executor::Sequential;
        };
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Executor::Pool { pool, threads },
            Err(err) => {
                warn!(threads, error = %err, "worker pool unavailable, running sequentially");
                Executor::Sequential
            }
        }
    }

    pub fn threads(&self) -> usize {
        match self {
            Executor::Sequential => 1,
            Executor::Pool { threads, .. } => *threads,
        }
    }

    /// Applies `work` to every item and concatenates the outputs.
    ///
    /// On the pool, items are split into contiguous chunks, one per thread, and chunk
    /// outputs are joined in chunk order.
    pub fn run_chunked<T, R, F>(&self, items: &[T], work: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Vec<R> + Sync + Send,
    {
        match self {
            Executor::Sequential => items.iter().flat_map(|item| work(item)).collect(),
            Executor::Pool { pool, threads } => {
                let chunks = split_into_chunks(items, *threads);
                let parts: Vec<Vec<R>> = pool.install(|| {
                    chunks
                        .par_iter()
                        .map(|chunk| chunk.iter().flat_map(|item| work(item)).collect())
                        .collect()
                });
                parts.into_iter().flatten().collect()
            }
        }
    }
}
