//! Run configuration shared by the shared-memory and distributed entry points.

use crate::error::{configuration_error, Result};
use crate::{DEFAULT_MAX_DEPTH, DEFAULT_THRESHOLD, STRASSEN_FAN_OUT};

/// Tuning knobs for one multiplication.
///
/// * `threshold` - sides at or below this go straight to the base-case kernel;
///   it is also the padding granularity.
/// * `max_depth` - recursion levels below this fork tasks; deeper levels run
///   the serial arena-backed recursion.
/// * `threads` - size of the scheduler's thread pool (`None` = Rayon default).
/// * `worker_count` - process count the distributed entry points require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrassenConfig {
    pub threshold: usize,
    pub max_depth: usize,
    pub threads: Option<usize>,
    pub worker_count: usize,
}

impl Default for StrassenConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
            threads: None,
            worker_count: STRASSEN_FAN_OUT,
        }
    }
}

impl StrassenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Checks the values every entry point depends on.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero threshold or zero threads.
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(configuration_error("threshold must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(configuration_error("thread count must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StrassenConfig::default();
        assert_eq!(config.threshold, 128);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.threads, None);
        assert_eq!(config.worker_count, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = StrassenConfig::new()
            .with_threshold(64)
            .with_max_depth(2)
            .with_threads(3)
            .with_worker_count(4);
        assert_eq!(
            config,
            StrassenConfig {
                threshold: 64,
                max_depth: 2,
                threads: Some(3),
                worker_count: 4,
            }
        );
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(StrassenConfig::new().with_threshold(0).validate().is_err());
        assert!(StrassenConfig::new().with_threads(0).validate().is_err());
    }
}
