//! Utility functions and types

pub mod parallel;
pub mod stats;

pub use parallel::{ParallelConfig, run_in_pool};
pub use stats::{median, quantile, quantile_sorted};
