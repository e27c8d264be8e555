//! Typed component access.

use std::fmt;
use std::marker::PhantomData;

use engine_component::{Component, ComponentStore, ComponentType, Entity};

use crate::error::WorldError;
use crate::world::World;

/// Typed handle to one component type's store in a world.
///
/// A mapper is a resolved [`ComponentType`] plus the Rust type; it holds no
/// borrow, so systems can keep one around and pass the world in per call.
pub struct ComponentMapper<T> {
    component_type: ComponentType,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ComponentMapper<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentMapper<T> {}

impl<T: Component> ComponentMapper<T> {
    pub(crate) fn new(component_type: ComponentType) -> Self {
        Self {
            component_type,
            _marker: PhantomData,
        }
    }

    /// The mapped component type.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    fn store<'w>(&self, world: &'w World) -> Option<&'w ComponentStore<T>> {
        world
            .components
            .erased(self.component_type.index)?
            .downcast_ref::<T>()
            .ok()
    }

    /// The entity's component, including one pending delayed removal.
    #[must_use]
    pub fn get<'w>(&self, world: &'w World, entity: Entity) -> Option<&'w T> {
        self.store(world)?.get(entity)
    }

    /// Mutable access to the entity's component.
    pub fn get_mut<'w>(&self, world: &'w mut World, entity: Entity) -> Option<&'w mut T> {
        world
            .components
            .erased_mut(self.component_type.index)?
            .downcast_mut::<T>()
            .ok()?
            .get_mut(entity)
    }

    /// The entity's component, or `fallback` if it has none.
    #[must_use]
    pub fn get_or<'a>(&self, world: &'a World, entity: Entity, fallback: &'a T) -> &'a T {
        self.get(world, entity).unwrap_or(fallback)
    }

    /// Returns `true` if the active entity owns the component and it is not
    /// pending removal.
    #[must_use]
    pub fn has(&self, world: &World, entity: Entity) -> bool {
        world.is_active(entity) && self.store(world).is_some_and(|store| store.has(entity))
    }

    /// Create the component, or return the existing one.
    pub fn create<'w>(&self, world: &'w mut World, entity: Entity) -> Result<&'w mut T, WorldError> {
        world.create_component::<T>(entity)
    }

    /// Remove the component if present.
    pub fn remove(&self, world: &mut World, entity: Entity) -> Result<(), WorldError> {
        world.remove_component_type(self.component_type, entity)
    }

    /// Create the component when `value` is `true`, remove it otherwise.
    pub fn set<'w>(
        &self,
        world: &'w mut World,
        entity: Entity,
        value: bool,
    ) -> Result<Option<&'w mut T>, WorldError> {
        if value {
            self.create(world, entity).map(Some)
        } else {
            self.remove(world, entity).map(|()| None)
        }
    }
}

impl<T> fmt::Debug for ComponentMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMapper[{}]", self.component_type.name)
    }
}
