//! The [`System`] trait and closure-backed systems.
//!
//! A system declares its data access as an [`Archetype`] and exposes three
//! lifecycle hooks. The hooks are only ever invoked by the scheduler that
//! owns the system: registration moves the system into the scheduler, and
//! nothing hands it back out.
//!
//! ## Threading
//!
//! `initialize` runs once on the registering thread with exclusive access.
//! `tick` runs on a worker thread, possibly at the same time as other
//! systems whose archetypes are parallel-safe with this one, hence `&self`.
//! `shutdown` runs once on the thread that shuts the scheduler down.

use engine_component::Archetype;

use crate::config::SystemConfig;
use crate::context::TickContext;

/// A unit of per-frame logic.
pub trait System: Send + Sync {
    /// Human-readable name, used in logs and graph dumps.
    fn name(&self) -> &str;

    /// The components this system reads (`is_const`) and writes.
    ///
    /// Queried once, at registration.
    fn archetype(&self) -> Archetype;

    /// Called once, right after the system has been linked into the graph.
    fn initialize(&mut self) {}

    /// Called once per tick, after every system it depends on has finished.
    fn tick(&self, ctx: &TickContext);

    /// Called once when the scheduler shuts down.
    fn shutdown(&self) {}
}

/// A [`System`] backed by a closure.
pub struct FnSystem<F>
where
    F: Fn(&TickContext) + Send + Sync + 'static,
{
    config: SystemConfig,
    f: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&TickContext) + Send + Sync + 'static,
{
    /// Create a new closure-backed system.
    #[must_use]
    pub fn new(config: SystemConfig, f: F) -> Self {
        Self { config, f }
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(&TickContext) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    fn archetype(&self) -> Archetype {
        self.config.archetype.clone()
    }

    fn tick(&self, ctx: &TickContext) {
        (self.f)(ctx)
    }
}

impl<F> std::fmt::Debug for FnSystem<F>
where
    F: Fn(&TickContext) + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSystem")
            .field("name", &self.config.name)
            .field("archetype", &self.config.archetype)
            .finish_non_exhaustive()
    }
}
