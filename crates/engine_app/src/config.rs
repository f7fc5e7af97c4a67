//! Scheduler configuration.

use std::time::Duration;

use crate::error::SchedulerError;

/// The environment variable used to override the worker thread count.
pub const WORKER_THREADS_ENV: &str = "ENGINE_WORKER_THREADS";

/// The environment variable used to enable the stall watchdog, in milliseconds.
pub const STALL_TIMEOUT_ENV: &str = "ENGINE_STALL_TIMEOUT_MS";

/// Configuration for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of worker threads in the pool. Always at least 1.
    pub worker_threads: usize,
    /// How long `tick` waits for the graph to complete before giving up.
    /// `None` waits forever.
    pub stall_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            stall_timeout: None,
        }
    }
}

impl SchedulerConfig {
    /// Read overrides from [`WORKER_THREADS_ENV`] and [`STALL_TIMEOUT_ENV`],
    /// falling back to [`SchedulerConfig::default`] for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] if a variable is set but does not
    /// parse as a positive integer.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let mut config = Self::default();
        if let Some(threads) = read_env(WORKER_THREADS_ENV)? {
            config = config.with_worker_threads(threads as usize);
        }
        if let Some(millis) = read_env(STALL_TIMEOUT_ENV)? {
            config = config.with_stall_timeout(Duration::from_millis(millis));
        }
        Ok(config)
    }

    /// Override the worker thread count (clamped to at least 1).
    #[must_use]
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    /// Enable the stall watchdog.
    #[must_use]
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn read_env(var: &'static str) -> Result<Option<u64>, SchedulerError> {
    let Ok(value) = std::env::var(var) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
        _ => Err(SchedulerError::Config { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_workers() {
        let config = SchedulerConfig::default();
        assert!(config.worker_threads >= 1);
        assert!(config.stall_timeout.is_none());
    }

    #[test]
    fn test_worker_threads_clamped() {
        let config = SchedulerConfig::default().with_worker_threads(0);
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn test_with_stall_timeout() {
        let config = SchedulerConfig::default().with_stall_timeout(Duration::from_millis(250));
        assert_eq!(config.stall_timeout, Some(Duration::from_millis(250)));
    }
}
