//! Archetype error types.

use crate::component::ComponentTypeId;

/// Errors that can occur while persisting or restoring an archetype.
#[derive(Debug, thiserror::Error)]
pub enum ArchetypeError {
    /// Failed to encode an archetype to MessagePack.
    #[error("failed to encode archetype: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode an archetype from MessagePack.
    #[error("failed to decode archetype: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A persisted component carried the null type id.
    #[error("component `{name}` has a null type id")]
    NullType {
        /// Persisted component name.
        name: String,
    },

    /// A persisted type id is not known to the type registry.
    #[error("component `{name}` references unknown type id {type_id}")]
    UnresolvedType {
        /// Persisted component name.
        name: String,
        /// The id that failed to resolve.
        type_id: ComponentTypeId,
    },

    /// A persisted name disagrees with the name registered for its type id.
    #[error("component `{name}` has type id {type_id}, which is registered as `{registered}`")]
    NameMismatch {
        /// Persisted component name.
        name: String,
        /// Name the registry holds for `type_id`.
        registered: String,
        /// The persisted type id.
        type_id: ComponentTypeId,
    },

    /// Two persisted components share a name but not a type id.
    #[error("component name `{name}` is used by more than one type id")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// The declared component count disagrees with the records present.
    #[error("archetype declares {declared} components but carries {actual}")]
    CountMismatch {
        /// Count written in the header.
        declared: u64,
        /// Number of component records actually present.
        actual: usize,
    },
}
