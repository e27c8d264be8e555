//! Precompiled entity blueprints.
//!
//! An [`Archetype`] bakes a fixed composition and the stores needed to
//! populate it, so [`World::create_from`] can create a fully formed entity
//! without resolving its composition per call. Archetypes belong to the world
//! that built them.

use engine_component::{BitVector, Component, ComponentKey, ComponentType};

use crate::identity::CompositionId;
use crate::transmuter::TransmuteOperation;
use crate::world::World;

/// A fixed target composition for bulk entity creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archetype {
    operation: TransmuteOperation,
    keys: Vec<ComponentKey>,
}

impl Archetype {
    /// Identity of the composition every created entity starts with.
    #[must_use]
    pub fn composition(&self) -> CompositionId {
        self.operation.composition()
    }

    /// Component types created for each entity.
    #[must_use]
    pub fn component_types(&self) -> &[ComponentType] {
        self.operation.additions()
    }

    pub(crate) fn operation(&self) -> &TransmuteOperation {
        &self.operation
    }
}

/// Collects the component types of an [`Archetype`].
#[derive(Debug, Clone, Default)]
pub struct ArchetypeBuilder {
    keys: Vec<ComponentKey>,
}

impl ArchetypeBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the component types of `parent`.
    #[must_use]
    pub fn from_parent(parent: &Archetype) -> Self {
        Self {
            keys: parent.keys.clone(),
        }
    }

    /// Include component `T`.
    #[must_use]
    pub fn add<T: Component>(mut self) -> Self {
        let key = ComponentKey::of::<T>();
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    /// Leave out component `T`.
    #[must_use]
    pub fn remove<T: Component>(mut self) -> Self {
        let key = ComponentKey::of::<T>();
        self.keys.retain(|existing| *existing != key);
        self
    }

    /// Register the types in `world` and intern the resulting composition.
    pub fn build(&self, world: &mut World) -> Archetype {
        let registry = world.components.registry_mut();
        let mut types: Vec<ComponentType> =
            self.keys.iter().map(|key| key.register(registry)).collect();
        types.sort_by_key(|component_type| component_type.index);
        world.sync_component_types();

        let bits: BitVector = types.iter().map(|component_type| component_type.index).collect();
        let composition = world.composition_identity(&bits);
        Archetype {
            operation: TransmuteOperation {
                composition,
                additions: types,
                removals: Vec::new(),
            },
            keys: self.keys.clone(),
        }
    }
}
