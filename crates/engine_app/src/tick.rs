//! Fixed-timestep tick loop.
//!
//! Drives a [`Scheduler`] at a target rate:
//!
//! 1. Tick the scheduler with the fixed timestep as `delta_time`.
//! 2. Sleep for whatever is left of the tick budget, or warn if the tick
//!    overran it.
//! 3. After `max_ticks` ticks, shut the scheduler down.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// The fixed timestep.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTickRate`] unless `tick_rate` is
    /// finite and positive.
    pub fn tick_duration(&self) -> Result<Duration, SchedulerError> {
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            return Err(SchedulerError::InvalidTickRate {
                tick_rate: self.tick_rate,
            });
        }
        Duration::try_from_secs_f64(1.0 / self.tick_rate).map_err(|_| {
            SchedulerError::InvalidTickRate {
                tick_rate: self.tick_rate,
            }
        })
    }
}

/// Runs a scheduler on a fixed timestep.
#[derive(Debug)]
pub struct TickLoop {
    config: TickConfig,
    scheduler: Scheduler,
    tick_count: u64,
}

impl TickLoop {
    /// Create a tick loop driving `scheduler`.
    #[must_use]
    pub fn new(config: TickConfig, scheduler: Scheduler) -> Self {
        Self {
            config,
            scheduler,
            tick_count: 0,
        }
    }

    /// Number of ticks run by this loop.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns a reference to the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns a mutable reference to the scheduler, e.g. to register more
    /// systems between ticks.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Give the scheduler back, e.g. to inspect it after [`TickLoop::run`].
    #[must_use]
    pub fn into_scheduler(self) -> Scheduler {
        self.scheduler
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Propagates any [`SchedulerError`] from [`Scheduler::tick`].
    pub fn tick(&mut self, dt: f64) -> Result<(), SchedulerError> {
        self.scheduler.tick(dt)?;
        self.tick_count += 1;
        Ok(())
    }

    /// Run the loop for the configured number of ticks, or until a tick
    /// fails, then shut the scheduler down.
    ///
    /// With `max_ticks == 0` the loop only ends on error.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTickRate`] before ticking if the
    /// configured rate is unusable. Otherwise returns the first
    /// [`SchedulerError`] from a tick; the scheduler is left poisoned and is
    /// not shut down, since tasks of the failed tick may still be running.
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        let tick_duration = self.config.tick_duration()?;
        let dt = tick_duration.as_secs_f64();
        let mut ran = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            systems = self.scheduler.systems().len(),
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(dt)?;

            ran += 1;
            if self.config.max_ticks > 0 && ran >= self.config.max_ticks {
                info!(ticks = ran, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.scheduler.tick_id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }

        self.scheduler.shutdown();
        Ok(())
    }
}
