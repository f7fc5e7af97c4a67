//! Persisted archetype layout.
//!
//! An archetype is stored as its component count followed by one record per
//! component, in order:
//!
//! ```text
//! component_count: u64
//! component_count × { name: string, type_id: u64, is_const: bool }
//! ```
//!
//! Records are MessagePack-encoded with `rmp-serde`. There is no version
//! field. Decoding resolves every type id through a [`TypeRegistry`] and
//! fails on the first id it cannot resolve.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archetype::Archetype;
use crate::component::{ComponentTypeId, QualifiedComponentType};
use crate::error::ArchetypeError;
use crate::registry::TypeRegistry;

/// On-disk form of an [`Archetype`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchetypeRecord {
    /// Number of entries in `components`.
    pub component_count: u64,
    /// One record per component, in archetype order.
    pub components: Vec<ComponentRecord>,
}

/// On-disk form of a [`QualifiedComponentType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Component name.
    pub name: String,
    /// Raw type id; `0` is the null type.
    pub type_id: u64,
    /// Read-only qualifier.
    pub is_const: bool,
}

impl From<&Archetype> for ArchetypeRecord {
    fn from(archetype: &Archetype) -> Self {
        let components: Vec<ComponentRecord> = archetype
            .iter()
            .map(|c| ComponentRecord {
                name: c.name.clone(),
                type_id: c.type_id.0,
                is_const: c.is_const,
            })
            .collect();
        Self {
            component_count: components.len() as u64,
            components,
        }
    }
}

impl ArchetypeRecord {
    /// Rebuild the archetype, resolving every type id through `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchetypeError::CountMismatch`] if the header disagrees with
    /// the records, [`ArchetypeError::NullType`] for a zero type id,
    /// [`ArchetypeError::UnresolvedType`] for an id the registry does not know,
    /// [`ArchetypeError::NameMismatch`] when the stored name is not the one
    /// registered for the id, and [`ArchetypeError::DuplicateName`] when two
    /// records share a name but not a type id.
    pub fn resolve<R>(self, registry: &R) -> Result<Archetype, ArchetypeError>
    where
        R: TypeRegistry + ?Sized,
    {
        if self.component_count != self.components.len() as u64 {
            return Err(ArchetypeError::CountMismatch {
                declared: self.component_count,
                actual: self.components.len(),
            });
        }

        let mut archetype = Archetype::new();
        for record in self.components {
            let type_id = ComponentTypeId(record.type_id);
            if type_id.is_null() {
                return Err(ArchetypeError::NullType { name: record.name });
            }
            let Some(info) = registry.resolve(type_id) else {
                return Err(ArchetypeError::UnresolvedType {
                    name: record.name,
                    type_id,
                });
            };
            if info.name != record.name {
                return Err(ArchetypeError::NameMismatch {
                    name: record.name,
                    registered: info.name,
                    type_id,
                });
            }
            if archetype.has_component(record.name.as_str()) && !archetype.has_component(type_id) {
                return Err(ArchetypeError::DuplicateName { name: record.name });
            }
            archetype.add_component(QualifiedComponentType {
                name: record.name,
                type_id: info.type_id,
                is_const: record.is_const,
            });
        }
        Ok(archetype)
    }
}

/// Encode an archetype to MessagePack bytes.
///
/// # Errors
///
/// Returns [`ArchetypeError::Encode`] if serialisation fails.
pub fn encode(archetype: &Archetype) -> Result<Vec<u8>, ArchetypeError> {
    let record = ArchetypeRecord::from(archetype);
    rmp_serde::to_vec(&record).map_err(ArchetypeError::Encode)
}

/// Decode an archetype from MessagePack bytes.
///
/// # Errors
///
/// Returns [`ArchetypeError::Decode`] for malformed bytes, or any error of
/// [`ArchetypeRecord::resolve`].
pub fn decode<R>(bytes: &[u8], registry: &R) -> Result<Archetype, ArchetypeError>
where
    R: TypeRegistry + ?Sized,
{
    let record: ArchetypeRecord = rmp_serde::from_slice(bytes).map_err(ArchetypeError::Decode)?;
    let archetype = record.resolve(registry)?;
    debug!(archetype = %archetype.id(), components = archetype.len(), "decoded archetype");
    Ok(archetype)
}
