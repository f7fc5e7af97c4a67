//! # engine_component
//!
//! Component identity and archetype algebra for the engine scheduler.
//!
//! This crate provides:
//!
//! - [`Component`] trait and [`ComponentTypeId`] — stable, name-derived type ids.
//! - [`QualifiedComponentType`] — a component type plus a read-only qualifier.
//! - [`Archetype`] — an ordered, hashed set of qualified components with set
//!   algebra and the parallel-safety predicate used by the scheduler.
//! - [`TypeRegistry`] / [`ComponentRegistry`] — id resolution for decoding.
//! - [`codec`] — the persisted archetype layout.

pub mod archetype;
pub mod codec;
pub mod component;
pub mod error;
pub mod registry;

pub use archetype::{Archetype, ArchetypeId, ComponentKey};
pub use codec::{ArchetypeRecord, ComponentRecord, decode, encode};
pub use component::{Component, ComponentInfo, ComponentTypeId, QualifiedComponentType};
pub use error::ArchetypeError;
pub use registry::{ComponentRegistry, TypeRegistry};
