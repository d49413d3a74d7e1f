//! Effect registry: stable ids to canonical effect names.
//!
//! The built-in table is the single source of truth for which effect ids a
//! batch may reference. Its enumeration order is also the order in which a
//! record's active effects are applied.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::error::RegistryError;

/// Canonical name of the blur effect.
pub const BLUR: &str = "blur";
/// Canonical name of the convert (filter) effect.
pub const CONVERT: &str = "convert";
/// Canonical name of the resize effect.
pub const RESIZE: &str = "resize";

/// Built-in id table, in application order.
const BUILTIN_TABLE: &[(&str, &str)] = &[("effect1", BLUR), ("effect2", CONVERT), ("effect3", RESIZE)];

static BUILTIN: LazyLock<Arc<EffectRegistry>> = LazyLock::new(|| {
    let descriptors = BUILTIN_TABLE
        .iter()
        .map(|(id, name)| EffectDescriptor::new(*id, *name))
        .collect();
    Arc::new(EffectRegistry { descriptors })
});

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectDescriptor {
    /// Short key used in batch operations (e.g. "effect1")
    pub id: String,
    /// Canonical effect name (e.g. "blur")
    pub name: String,
}

impl EffectDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Immutable, ordered mapping from effect id to canonical name.
#[derive(Debug, Clone)]
pub struct EffectRegistry {
    descriptors: Vec<EffectDescriptor>,
}

impl EffectRegistry {
    /// Build a registry from descriptors, preserving their order.
    ///
    /// Ids and names must each be unique.
    pub fn new(descriptors: Vec<EffectDescriptor>) -> Result<Self, RegistryError> {
        if descriptors.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for d in &descriptors {
            if !ids.insert(d.id.as_str()) {
                return Err(RegistryError::DuplicateId(d.id.clone()));
            }
            if !names.insert(d.name.as_str()) {
                return Err(RegistryError::DuplicateName(d.name.clone()));
            }
        }

        Ok(Self { descriptors })
    }

    /// The process-wide built-in registry: effect1 → blur, effect2 → convert,
    /// effect3 → resize.
    pub fn builtin() -> Arc<EffectRegistry> {
        Arc::clone(&BUILTIN)
    }

    /// Check whether an effect id is known.
    pub fn is_valid(&self, effect_id: &str) -> bool {
        self.find(effect_id).is_some()
    }

    /// Canonical name for an effect id, if the id is known.
    pub fn canonical_name(&self, effect_id: &str) -> Option<&str> {
        self.find(effect_id).map(|d| d.name.as_str())
    }

    /// All canonical names in registry order.
    pub fn all_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    /// All descriptors in registry order.
    pub fn descriptors(&self) -> &[EffectDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    // Linear scan: tables are a handful of entries and order matters more
    // than lookup speed.
    fn find(&self, effect_id: &str) -> Option<&EffectDescriptor> {
        self.descriptors.iter().find(|d| d.id == effect_id)
    }
}
