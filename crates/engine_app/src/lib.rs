//! # engine_app
//!
//! Fork-join system scheduler.
//!
//! Systems declare the components they read and write as an
//! [`Archetype`](engine_component::Archetype). The [`Scheduler`] inserts each
//! registered system into a directed acyclic [`TaskGraph`] bracketed by a
//! Start and an End sentinel, placing it after every earlier system it
//! conflicts with and as early as possible otherwise. Every tick the graph is
//! dispatched on a worker pool: a task is submitted once all its parents have
//! finished, and the calling thread blocks until End is reached.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engine_app::{Scheduler, SchedulerConfig};
//! use engine_component::{Archetype, QualifiedComponentType};
//! use engine_system::{FnSystem, SystemConfig};
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::default())?;
//! scheduler.register_system(FnSystem::new(
//!     SystemConfig::new(
//!         "movement",
//!         Archetype::new().with(QualifiedComponentType::named("Position", false)),
//!     ),
//!     |_ctx| {},
//! ));
//! scheduler.tick(1.0 / 60.0)?;
//! scheduler.shutdown();
//! # Ok::<(), engine_app::SchedulerError>(())
//! ```

pub mod config;
mod dispatch;
pub mod error;
pub mod graph;
pub mod pool;
pub mod scheduler;
pub mod tick;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use graph::{GraphSnapshot, SystemHandle, Task, TaskGraph, TaskId, TaskSnapshot};
pub use pool::{Job, RayonPool, ThreadPool};
pub use scheduler::{Scheduler, SystemInfo};
pub use tick::{TickConfig, TickLoop};
