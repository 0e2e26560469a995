//! Thread-pool executor for block-wise numerical kernels.
//!
//! Each problem instance owns its own executor, so two problems built with
//! different thread counts never share a global pool. Kernels are
//! expressed as independent per-block closures; the executor decides
//! whether to fan them out over its pool or run them inline.

use crate::error::{ManifoldError, Result};
use rayon::prelude::*;
use std::sync::Arc;

/// Executes independent per-block kernels, optionally in parallel.
#[derive(Debug, Clone)]
pub struct KernelExecutor {
    num_threads: usize,
    /// Minimum number of blocks before work is dispatched to the pool
    min_blocks_for_parallel: usize,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl KernelExecutor {
    /// Creates an executor with `num_threads` workers.
    ///
    /// A thread count of one runs every kernel on the calling thread and
    /// does not build a pool.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(ManifoldError::numerical_error(
                "kernel executor requires at least one thread",
            ));
        }

        let pool = if num_threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("sesync-kernel-{i}"))
                .build()
                .map_err(|e| {
                    ManifoldError::numerical_error(format!("failed to build thread pool: {e}"))
                })?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            num_threads,
            min_blocks_for_parallel: 64,
            pool,
        })
    }

    /// Executor that runs every kernel on the calling thread.
    pub fn sequential() -> Self {
        Self {
            num_threads: 1,
            min_blocks_for_parallel: usize::MAX,
            pool: None,
        }
    }

    /// Sets the minimum number of blocks for parallel dispatch.
    pub fn with_min_blocks_for_parallel(mut self, min_blocks: usize) -> Self {
        self.min_blocks_for_parallel = min_blocks;
        self
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Applies `kernel` to every block index in `0..count`, preserving order.
    pub fn map_blocks<R, F>(&self, count: usize, kernel: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) if count >= self.min_blocks_for_parallel => {
                pool.install(|| (0..count).into_par_iter().map(&kernel).collect())
            }
            _ => (0..count).map(kernel).collect(),
        }
    }

    /// Like [`map_blocks`](Self::map_blocks) for fallible kernels.
    ///
    /// Returns the first error in block order.
    pub fn try_map_blocks<R, F>(&self, count: usize, kernel: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize) -> Result<R> + Sync + Send,
    {
        self.map_blocks(count, kernel).into_iter().collect()
    }
}

impl Default for KernelExecutor {
    fn default() -> Self {
        Self::new(num_cpus::get().max(1)).unwrap_or_else(|_| Self::sequential())
    }
}
