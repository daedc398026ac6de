//! Thread pool configuration for the parallel aggregation passes
//!
//! The spatial pass and the resampling operators run on Rayon's global pool;
//! this module configures that pool once at startup.

use crate::errors::{Result, SstAggError};
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    #[must_use]
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Set up the global Rayon thread pool
    ///
    /// Without an explicit thread count Rayon's default pool is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SstAggError::ThreadPoolError`] if the thread count is zero or
    /// the global pool was already built.
    pub fn setup_global_pool(&self) -> Result<()> {
        match self.num_threads {
            Some(0) => Err(SstAggError::ThreadPoolError(
                "thread count must be at least 1".to_string(),
            )),
            Some(num_threads) => {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .thread_name(|i| format!("sst-agg-{}", i))
                    .build_global()
                    .map_err(|e| {
                        SstAggError::ThreadPoolError(format!(
                            "Failed to initialize thread pool with {} threads: {}",
                            num_threads, e
                        ))
                    })?;
                info!(threads = num_threads, "configured thread pool");
                Ok(())
            }
            None => {
                info!(threads = rayon::current_num_threads(), "using default thread pool");
                Ok(())
            }
        }
    }

    /// One thread per CPU core
    #[must_use]
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    #[must_use]
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }
}

/// Snapshot of the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    #[must_use]
    pub fn collect() -> Self {
        Self {
            current_threads: rayon::current_num_threads(),
            available_cores: num_cpus::get(),
            available_parallelism: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
        }
    }

    pub fn print_info(&self) {
        println!("📊 Parallel Processing Information:");
        println!("   Current threads: {}", self.current_threads);
        println!("   Available CPU cores: {}", self.available_cores);
        println!("   Available parallelism: {}", self.available_parallelism);
    }
}
