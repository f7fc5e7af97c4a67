//! Scheduler error types.

use std::time::Duration;

/// Errors surfaced by the scheduler and its tick driver.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// A configuration variable held an unusable value.
    #[error("invalid value {value:?} for {var}")]
    Config {
        /// The environment variable.
        var: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A tick rate that is not a positive, finite number of ticks per second.
    #[error("invalid tick rate {tick_rate}; expected a positive number of ticks per second")]
    InvalidTickRate {
        /// The rejected rate.
        tick_rate: f64,
    },

    /// A system panicked while ticking. Its dependents never ran.
    #[error("system `{system}` panicked during tick {tick_id}: {message}")]
    SystemPanicked {
        /// Name of the panicking system.
        system: String,
        /// The tick that was aborted.
        tick_id: u64,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The stall watchdog expired before the graph completed.
    #[error("tick {tick_id} did not complete within {timeout:?}")]
    Stalled {
        /// The tick that stalled.
        tick_id: u64,
        /// The configured watchdog timeout.
        timeout: Duration,
    },

    /// The completion signal was dropped before the graph completed.
    #[error("tick {tick_id} lost its completion signal")]
    Disconnected {
        /// The tick that was abandoned.
        tick_id: u64,
    },

    /// An earlier tick failed; tasks from it may still be running.
    #[error("scheduler is poisoned by an earlier failed tick")]
    Poisoned,

    /// The scheduler has been shut down.
    #[error("scheduler has been shut down")]
    ShutDown,
}
