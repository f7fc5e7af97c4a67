//! System configuration.

use engine_component::Archetype;

/// Configuration for a closure-backed system.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Human-readable system name (e.g. `"physics"`).
    pub name: String,
    /// The components the system reads and writes.
    pub archetype: Archetype,
}

impl SystemConfig {
    /// Create a new system config with the given name and archetype.
    #[must_use]
    pub fn new(name: impl Into<String>, archetype: Archetype) -> Self {
        Self {
            name: name.into(),
            archetype,
        }
    }
}
