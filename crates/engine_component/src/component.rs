//! Core [`Component`] trait and qualified component descriptors.
//!
//! Every piece of data a system touches is identified by a [`ComponentTypeId`].
//! Systems declare *how* they touch it with a [`QualifiedComponentType`]: the
//! type plus a read-only (`is_const`) qualifier.
//!
//! ## Polyglot Type Identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm. This is deterministic and
//! language-neutral, so an archetype encoded by one process resolves to the
//! same ids in another.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
///
/// The value `0` is reserved as the null type id in the persisted archetype
/// layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// The null type id.
    pub const NULL: ComponentTypeId = ComponentTypeId(0);

    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name using
    /// the FNV-1a 64-bit hash algorithm.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }

    /// Returns `true` for the reserved null id.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// The core component trait.
///
/// Implementors only need a stable name; the type id is derived from it.
///
/// # Examples
///
/// ```rust
/// use engine_component::Component;
///
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// Returns the registry record for this component type.
    fn info() -> ComponentInfo {
        ComponentInfo {
            type_id: Self::component_type_id(),
            name: Self::type_name().to_string(),
        }
    }
}

/// What a type registry knows about a component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// The unique type identifier.
    pub type_id: ComponentTypeId,
    /// The human-readable name of the component (e.g. `"Transform3D"`).
    pub name: String,
}

impl ComponentInfo {
    /// Build a record for a component known only by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_id: ComponentTypeId::from_name(&name),
            name,
        }
    }
}

/// A component type tagged with the access a system needs to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedComponentType {
    /// Component name.
    pub name: String,
    /// Component type id.
    pub type_id: ComponentTypeId,
    /// `true` when the declaring system only reads this component.
    pub is_const: bool,
}

impl QualifiedComponentType {
    /// Read-only access to `T`.
    #[must_use]
    pub fn read<T: Component>() -> Self {
        Self::from_info(T::info(), true)
    }

    /// Mutable access to `T`.
    #[must_use]
    pub fn write<T: Component>() -> Self {
        Self::from_info(T::info(), false)
    }

    /// Qualify a registry record.
    #[must_use]
    pub fn from_info(info: ComponentInfo, is_const: bool) -> Self {
        Self {
            name: info.name,
            type_id: info.type_id,
            is_const,
        }
    }

    /// Qualify a component known only by name.
    #[must_use]
    pub fn named(name: impl Into<String>, is_const: bool) -> Self {
        Self::from_info(ComponentInfo::named(name), is_const)
    }
}

impl fmt::Display for QualifiedComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "&{}", self.name)
        } else {
            write!(f, "&mut {}", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health;

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        // The trait method and the standalone function must produce the same ID.
        let from_trait = Health::component_type_id();
        let from_name = ComponentTypeId::from_name("Health");
        assert_eq!(from_trait, from_name);
        assert_eq!(ComponentTypeId::of::<Health>(), from_name);
    }

    #[test]
    fn test_component_type_id_differs_between_names() {
        assert_ne!(
            ComponentTypeId::from_name("Health"),
            ComponentTypeId::from_name("Velocity")
        );
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
        assert!(!ComponentTypeId::from_name("").is_null());
    }

    #[test]
    fn test_qualified_read_and_write() {
        let r = QualifiedComponentType::read::<Health>();
        let w = QualifiedComponentType::write::<Health>();
        assert!(r.is_const);
        assert!(!w.is_const);
        assert_eq!(r.type_id, w.type_id);
        assert_eq!(r.name, "Health");
        assert_eq!(r.to_string(), "&Health");
        assert_eq!(w.to_string(), "&mut Health");
    }

    #[test]
    fn test_named_matches_typed() {
        assert_eq!(
            QualifiedComponentType::named("Health", true),
            QualifiedComponentType::read::<Health>()
        );
    }
}
