//! Component type registry.
//!
//! Archetypes persist only type ids. Decoding one needs a [`TypeRegistry`] to
//! turn each id back into a known component type; the registry is passed in
//! explicitly rather than looked up from global state.

use dashmap::DashMap;

use crate::component::{Component, ComponentInfo, ComponentTypeId};

/// Resolves persisted type ids to known component types.
pub trait TypeRegistry {
    /// Look up a component type by id. `None` means the id is unknown.
    fn resolve(&self, type_id: ComponentTypeId) -> Option<ComponentInfo>;
}

/// Concurrent registry of component types keyed by [`ComponentTypeId`].
///
/// Registration takes `&self`, so a single registry can be shared between
/// loader threads.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    types: DashMap<ComponentTypeId, ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the Rust component type `T`. Returns its id.
    pub fn register<T: Component>(&self) -> ComponentTypeId {
        self.insert(T::info())
    }

    /// Register a component known only by name. Returns its id.
    pub fn register_name(&self, name: impl Into<String>) -> ComponentTypeId {
        self.insert(ComponentInfo::named(name))
    }

    /// Insert a record, replacing any previous record with the same id.
    pub fn insert(&self, info: ComponentInfo) -> ComponentTypeId {
        let type_id = info.type_id;
        self.types.insert(type_id, info);
        type_id
    }

    /// Returns `true` if the id is registered.
    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.types.contains_key(&type_id)
    }

    /// Number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeRegistry for ComponentRegistry {
    fn resolve(&self, type_id: ComponentTypeId) -> Option<ComponentInfo> {
        self.types.get(&type_id).map(|entry| entry.value().clone())
    }
}

impl<R: TypeRegistry + ?Sized> TypeRegistry for &R {
    fn resolve(&self, type_id: ComponentTypeId) -> Option<ComponentInfo> {
        (**self).resolve(type_id)
    }
}
