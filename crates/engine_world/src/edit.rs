//! Batched structural edits to one entity.

use engine_component::{Component, ComponentType, Entity};

use crate::error::WorldError;
use crate::world::World;

/// Edits one entity's components.
///
/// Obtained from [`World::edit`]. Every operation updates the stores and the
/// entity's composition immediately; subscriptions see the result at the next
/// convergence round.
pub struct EntityEdit<'w> {
    world: &'w mut World,
    entity: Entity,
    slot: usize,
}

impl<'w> EntityEdit<'w> {
    pub(crate) fn new(world: &'w mut World, entity: Entity, slot: usize) -> Self {
        Self {
            world,
            entity,
            slot,
        }
    }

    /// The entity being edited.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Pool slot of the editor backing this handle.
    #[must_use]
    pub fn editor_slot(&self) -> usize {
        self.slot
    }

    /// Create component `T`, or return the existing one.
    pub fn create<T: Component>(&mut self) -> Result<&mut T, WorldError> {
        self.world.create_component::<T>(self.entity)
    }

    /// Attach `component`, replacing any existing `T`.
    ///
    /// Pooled types are rejected; create them with [`create`](Self::create).
    pub fn add<T: Component>(&mut self, component: T) -> Result<&mut Self, WorldError> {
        self.world.insert_component(self.entity, component)?;
        Ok(self)
    }

    /// Remove component `T` if present.
    pub fn remove<T: Component>(&mut self) -> Result<&mut Self, WorldError> {
        self.world.remove_component::<T>(self.entity)?;
        Ok(self)
    }

    /// Remove the component of a registered type if present.
    pub fn remove_type(&mut self, component_type: ComponentType) -> Result<&mut Self, WorldError> {
        self.world.remove_component_type(component_type, self.entity)?;
        Ok(self)
    }
}
