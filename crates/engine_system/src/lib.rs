//! # engine_system
//!
//! System abstractions for the engine scheduler.
//!
//! A system declares the components it touches as an
//! [`Archetype`](engine_component::Archetype) and is driven through the
//! lifecycle hooks of [`System`]. Closures become systems through
//! [`FnSystem`].
//!
//! ## Usage
//!
//! ```rust
//! use engine_component::{Archetype, QualifiedComponentType};
//! use engine_system::{FnSystem, SystemConfig};
//!
//! let physics = FnSystem::new(
//!     SystemConfig::new(
//!         "physics",
//!         Archetype::new()
//!             .with(QualifiedComponentType::named("Transform", true))
//!             .with(QualifiedComponentType::named("Velocity", false)),
//!     ),
//!     |ctx| {
//!         let _ = ctx.delta_time;
//!     },
//! );
//! # let _ = physics;
//! ```

pub mod config;
pub mod context;
pub mod system;

pub use config::SystemConfig;
pub use context::TickContext;
pub use system::{FnSystem, System};
