//! Parallel processing utilities

use crate::error::{AnomalyError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use the global rayon pool)
    pub n_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Run `f` on a dedicated pool of `config.n_threads` workers, or directly on
/// the global pool when no thread count is set.
pub fn run_in_pool<T, F>(config: &ParallelConfig, f: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match config.n_threads {
        None => Ok(f()),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| AnomalyError::ThreadPoolError(e.to_string()))?;
            Ok(pool.install(f))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_run_in_pool_global() {
        let config = ParallelConfig::new();
        let sum: i64 = run_in_pool(&config, || (0..1000i64).into_par_iter().sum()).unwrap();
        assert_eq!(sum, 499_500);
    }

    #[test]
    fn test_run_in_pool_bounded() {
        let config = ParallelConfig::new().with_threads(2);
        assert_eq!(config.num_threads(), 2);
        let threads = run_in_pool(&config, rayon::current_num_threads).unwrap();
        assert_eq!(threads, 2);
    }
}
