//! Archetype identity and set algebra.
//!
//! An archetype is an ordered set of [`QualifiedComponentType`]s: the
//! components a system touches and whether it only reads them. Its identity
//! is a 64-bit content hash over the component type ids in insertion order,
//! so two archetypes compare equal exactly when their ids match.
//!
//! The scheduler relies on a single predicate from this module,
//! [`Archetype::can_be_executed_in_parallel_with`], to decide whether two
//! systems may run at the same time.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId, QualifiedComponentType};

/// Content hash identifying an [`Archetype`].
///
/// The id of the empty archetype is `0`; every non-empty archetype has a
/// non-zero id.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ArchetypeId(pub u64);

impl ArchetypeId {
    /// The id of the empty (unconstrained) archetype.
    pub const INVALID: ArchetypeId = ArchetypeId(0);

    /// Golden-ratio increment used by the combine step.
    const GOLDEN: u64 = 0x9e37_79b9_7f4a_7c15;

    /// Fold one component type id into a running seed.
    ///
    /// Order-sensitive: `combine(combine(s, a), b) != combine(combine(s, b), a)`
    /// in general.
    #[must_use]
    pub const fn combine(seed: u64, type_id: ComponentTypeId) -> u64 {
        seed ^ type_id
            .0
            .wrapping_add(Self::GOLDEN)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2)
    }

    /// Compute the id of an ordered sequence of component type ids.
    #[must_use]
    pub fn from_type_ids<I>(types: I) -> Self
    where
        I: IntoIterator<Item = ComponentTypeId>,
    {
        let mut len = 0usize;
        let seed = types.into_iter().fold(0u64, |seed, ty| {
            len += 1;
            Self::combine(seed, ty)
        });
        Self::from_seed(seed, len)
    }

    /// Returns `true` unless this is the id of the empty archetype.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    // A non-empty sequence whose seed folds to zero would otherwise collide
    // with the empty archetype.
    const fn from_seed(seed: u64, len: usize) -> Self {
        match (len, seed) {
            (0, _) => Self::INVALID,
            (_, 0) => Self(Self::GOLDEN),
            (_, seed) => Self(seed),
        }
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Anything an archetype can be searched by: a type id or a component name.
pub trait ComponentKey {
    /// Position of the keyed component inside `archetype`, if present.
    fn position_in(&self, archetype: &Archetype) -> Option<usize>;
}

impl ComponentKey for ComponentTypeId {
    fn position_in(&self, archetype: &Archetype) -> Option<usize> {
        archetype.by_type.get(self).copied()
    }
}

impl ComponentKey for &str {
    fn position_in(&self, archetype: &Archetype) -> Option<usize> {
        archetype.by_name.get(*self).copied()
    }
}

impl ComponentKey for String {
    fn position_in(&self, archetype: &Archetype) -> Option<usize> {
        archetype.by_name.get(self.as_str()).copied()
    }
}

/// An ordered, identity-bearing set of qualified component types.
///
/// Equality, ordering and hashing only look at [`Archetype::id`]; two
/// archetypes with colliding ids are treated as identical.
#[derive(Debug, Clone, Default)]
pub struct Archetype {
    /// Running hash seed over `components` in order.
    seed: u64,
    /// Components in insertion order.
    components: Vec<QualifiedComponentType>,
    /// `type_id -> position in components`.
    by_type: HashMap<ComponentTypeId, usize>,
    /// `name -> position in components`.
    by_name: HashMap<String, usize>,
}

impl Archetype {
    /// Create the empty archetype (id `0`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an archetype from a component list, keeping its order.
    #[must_use]
    pub fn from_components<I>(components: I) -> Self
    where
        I: IntoIterator<Item = QualifiedComponentType>,
    {
        let mut archetype = Self::new();
        for component in components {
            archetype.add_component(component);
        }
        archetype
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read<T: Component>(mut self) -> Self {
        self.add_component(QualifiedComponentType::read::<T>());
        self
    }

    /// Add a mutable component requirement.
    #[must_use]
    pub fn write<T: Component>(mut self) -> Self {
        self.add_component(QualifiedComponentType::write::<T>());
        self
    }

    /// Add a component by qualified descriptor.
    #[must_use]
    pub fn with(mut self, component: QualifiedComponentType) -> Self {
        self.add_component(component);
        self
    }

    /// The content hash of this archetype.
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        ArchetypeId::from_seed(self.seed, self.components.len())
    }

    /// Append one component and fold it into the id.
    ///
    /// A type that is already present keeps its position; if the new
    /// descriptor is mutable the existing entry becomes mutable too. The id is
    /// unchanged in that case.
    ///
    /// Names and type ids must pair up one-to-one: `component.name` must not
    /// already belong to a component with a different type id. Debug builds
    /// panic on such a collision; [`decode`](crate::codec::decode) rejects it
    /// with an error.
    pub fn add_component(&mut self, component: QualifiedComponentType) {
        if let Some(&position) = self.by_type.get(&component.type_id) {
            let existing = &mut self.components[position];
            existing.is_const &= component.is_const;
            return;
        }

        debug_assert!(
            !self.by_name.contains_key(&component.name),
            "component name `{}` already names another type in archetype {}",
            component.name,
            self.id()
        );

        let position = self.components.len();
        self.seed = ArchetypeId::combine(self.seed, component.type_id);
        self.by_type.insert(component.type_id, position);
        self.by_name.insert(component.name.clone(), position);
        self.components.push(component);
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` for the empty archetype.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components in insertion order.
    #[must_use]
    pub fn components(&self) -> &[QualifiedComponentType] {
        &self.components
    }

    /// Iterate over the components in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, QualifiedComponentType> {
        self.components.iter()
    }

    /// Components accessed read-only.
    pub fn reads(&self) -> impl Iterator<Item = &QualifiedComponentType> {
        self.components.iter().filter(|c| c.is_const)
    }

    /// Components accessed mutably.
    pub fn writes(&self) -> impl Iterator<Item = &QualifiedComponentType> {
        self.components.iter().filter(|c| !c.is_const)
    }

    /// Returns `true` if the component (by type id or name) is present.
    #[must_use]
    pub fn has_component<K: ComponentKey>(&self, key: K) -> bool {
        key.position_in(self).is_some()
    }

    /// Position of a component (by type id or name), or `None` if absent.
    ///
    /// Use `archetype[type_id]` when the component is known to exist.
    #[must_use]
    pub fn index_of<K: ComponentKey>(&self, key: K) -> Option<usize> {
        key.position_in(self)
    }

    /// The descriptor for a component type, if present.
    #[must_use]
    pub fn get(&self, type_id: ComponentTypeId) -> Option<&QualifiedComponentType> {
        self.by_type.get(&type_id).map(|&i| &self.components[i])
    }

    /// All of self's components, then the components of `rhs` that self does
    /// not have. Self's qualifiers win on overlap.
    #[must_use]
    pub fn union(&self, rhs: &Archetype) -> Archetype {
        let mut out = self.clone();
        for component in rhs.iter() {
            if !out.by_type.contains_key(&component.type_id) {
                out.add_component(component.clone());
            }
        }
        out
    }

    /// Self's components that `rhs` does not have.
    #[must_use]
    pub fn difference(&self, rhs: &Archetype) -> Archetype {
        self.iter()
            .filter(|c| !rhs.has_component(c.type_id))
            .cloned()
            .collect()
    }

    /// Self's components that `rhs` also has, with self's qualifiers.
    #[must_use]
    pub fn intersection(&self, rhs: &Archetype) -> Archetype {
        self.iter()
            .filter(|c| rhs.has_component(c.type_id))
            .cloned()
            .collect()
    }

    /// Shared components, read-only only when both sides read-only.
    ///
    /// Lookups go through `rhs`'s type index, so neither side has to be in
    /// any particular order.
    #[must_use]
    pub fn strict_intersection(&self, rhs: &Archetype) -> Archetype {
        self.shared(rhs)
            .map(|(lhs, other)| QualifiedComponentType {
                is_const: lhs.is_const && other.is_const,
                ..lhs.clone()
            })
            .collect()
    }

    /// Number of component types present on both sides.
    #[must_use]
    pub fn intersection_len(&self, rhs: &Archetype) -> usize {
        self.shared(rhs).count()
    }

    /// Returns `true` if every component of self is in `rhs`.
    #[must_use]
    pub fn is_subset_of(&self, rhs: &Archetype) -> bool {
        self.intersection_len(rhs) == self.len()
    }

    /// Returns `true` if every component of `rhs` is in self.
    #[must_use]
    pub fn is_superset_of(&self, rhs: &Archetype) -> bool {
        self.intersection_len(rhs) == rhs.len()
    }

    /// Returns `true` if systems with these two archetypes may run at the same
    /// time: every shared component is read-only on both sides.
    ///
    /// Equivalent to "every component of `strict_intersection(rhs)` is const",
    /// without building the intersection.
    #[must_use]
    pub fn can_be_executed_in_parallel_with(&self, rhs: &Archetype) -> bool {
        self.shared(rhs)
            .all(|(lhs, other)| lhs.is_const && other.is_const)
    }

    /// The same components sorted by type id.
    ///
    /// Two archetypes with the same components built in different orders have
    /// different ids; their canonical forms have the same id.
    #[must_use]
    pub fn canonicalized(&self) -> Archetype {
        let mut components = self.components.clone();
        components.sort_by_key(|c| c.type_id);
        Self::from_components(components)
    }

    fn shared<'a>(
        &'a self,
        rhs: &'a Archetype,
    ) -> impl Iterator<Item = (&'a QualifiedComponentType, &'a QualifiedComponentType)> + 'a {
        self.components
            .iter()
            .filter_map(move |c| rhs.get(c.type_id).map(|other| (c, other)))
    }
}

impl PartialEq for Archetype {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Archetype {}

impl Hash for Archetype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Archetype {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Archetype {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id().cmp(&other.id())
    }
}

impl Index<ComponentTypeId> for Archetype {
    type Output = QualifiedComponentType;

    /// # Panics
    ///
    /// Panics if the component is not part of this archetype.
    fn index(&self, type_id: ComponentTypeId) -> &Self::Output {
        match self.get(type_id) {
            Some(component) => component,
            None => panic!("component type {type_id} is not part of archetype {}", self.id()),
        }
    }
}

impl FromIterator<QualifiedComponentType> for Archetype {
    fn from_iter<I: IntoIterator<Item = QualifiedComponentType>>(iter: I) -> Self {
        Self::from_components(iter)
    }
}

impl Extend<QualifiedComponentType> for Archetype {
    fn extend<I: IntoIterator<Item = QualifiedComponentType>>(&mut self, iter: I) {
        for component in iter {
            self.add_component(component);
        }
    }
}

impl<'a> IntoIterator for &'a Archetype {
    type Item = &'a QualifiedComponentType;
    type IntoIter = std::slice::Iter<'a, QualifiedComponentType>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{component}")?;
        }
        f.write_str("]")
    }
}
