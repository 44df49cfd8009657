//! Configuration for the engine, its queues and the reference path.

use vbatch_core::{Precision, getrf_vbatched_params};

/// Minimum trailing columns before a matrix's update is split across threads.
pub const DEFAULT_COLUMN_GRAIN: usize = 32;

/// Blocking parameters for the batched LU engine.
///
/// By default both block sizes come from the tuned advisor tables; set them
/// explicitly to sweep blockings in benchmarks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Panel width override.
    pub nb: Option<usize>,
    /// Recursive block size override.
    pub recnb: Option<usize>,
}

impl EngineConfig {
    /// Override the panel width.
    pub fn with_nb(mut self, nb: usize) -> Self {
        self.nb = Some(nb);
        self
    }

    /// Override the recursive block size.
    pub fn with_recnb(mut self, recnb: usize) -> Self {
        self.recnb = Some(recnb);
        self
    }

    /// Resolve `(nb, recnb)` for a batch, falling back to the advisor.
    ///
    /// Both values are clamped to at least 1.
    pub fn block_sizes(&self, max_m: usize, max_n: usize, precision: Precision) -> (usize, usize) {
        let (nb, recnb) = getrf_vbatched_params(max_m, max_n, precision);
        (
            self.nb.unwrap_or(nb).max(1),
            self.recnb.unwrap_or(recnb).max(1),
        )
    }
}

/// Configuration for an execution queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Worker threads; `None` uses one per logical core.
    pub threads: Option<usize>,
    /// Prefix for worker thread names.
    pub name: String,
    /// Minimum trailing columns before one matrix is updated in parallel.
    pub column_grain: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            threads: None,
            name: "vbatch-queue".to_string(),
            column_grain: DEFAULT_COLUMN_GRAIN,
        }
    }
}

impl QueueConfig {
    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the column grain for intra-matrix parallelism.
    pub fn with_column_grain(mut self, grain: usize) -> Self {
        self.column_grain = grain.max(1);
        self
    }
}

/// Configuration for the CPU reference factorization.
///
/// Thread count is passed explicitly instead of toggling a process-wide
/// setting, so reference timings never leak into engine runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceConfig {
    /// Worker threads; 0 uses one per logical core.
    pub threads: usize,
}

impl ReferenceConfig {
    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes_default_to_advisor() {
        let config = EngineConfig::default();
        assert_eq!(config.block_sizes(100, 100, Precision::Double), (64, 32));
        assert_eq!(config.block_sizes(100, 3000, Precision::Single), (128, 32));
    }

    #[test]
    fn test_block_size_overrides() {
        let config = EngineConfig::default().with_nb(16).with_recnb(0);
        assert_eq!(config.block_sizes(100, 100, Precision::Double), (16, 1));
    }

    #[test]
    fn test_queue_config_builders() {
        let config = QueueConfig::default()
            .with_threads(3)
            .with_name("q")
            .with_column_grain(0);
        assert_eq!(config.threads, Some(3));
        assert_eq!(config.name, "q");
        assert_eq!(config.column_grain, 1);
    }
}
