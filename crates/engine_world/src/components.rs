//! Component stores and per-entity composition identities.

use engine_component::{
    BitVector, Component, ComponentError, ComponentStore, ComponentType, ComponentTypeRegistry,
    Entity, ErasedStore,
};

use crate::identity::{CompositionId, CompositionIdentityResolver, Interned};

/// Owns one store per registered component type and the composition identity
/// of every entity.
pub struct ComponentManager {
    registry: ComponentTypeRegistry,
    stores: Vec<Box<dyn ErasedStore>>,
    identities: CompositionIdentityResolver,
    entity_identity: Vec<CompositionId>,
    capacity: usize,
}

impl ComponentManager {
    /// Create a manager sized for `capacity` entities.
    #[must_use]
    pub fn new(capacity: usize, always_delay_removal: bool) -> Self {
        Self {
            registry: ComponentTypeRegistry::with_delayed_removal(always_delay_removal),
            stores: Vec::new(),
            identities: CompositionIdentityResolver::new(),
            entity_identity: vec![CompositionId::EMPTY; capacity],
            capacity,
        }
    }

    /// The component type registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentTypeRegistry {
        &self.registry
    }

    /// Mutable access to the registry. Call [`sync_stores`](Self::sync_stores)
    /// after registering through it.
    pub fn registry_mut(&mut self) -> &mut ComponentTypeRegistry {
        &mut self.registry
    }

    /// Register `T` and make sure its store exists.
    pub fn register<T: Component>(&mut self) -> ComponentType {
        let component_type = self.registry.register::<T>();
        self.sync_stores();
        component_type
    }

    /// Create stores for types registered since the last call. Returns the
    /// newly covered types.
    pub fn sync_stores(&mut self) -> Vec<ComponentType> {
        let mut added = Vec::new();
        for index in self.stores.len()..self.registry.len() {
            if let Some(store) = self.registry.make_store(index, self.capacity) {
                added.push(store.component_type());
                self.stores.push(store);
            }
        }
        added
    }

    /// Typed store for `T`, if registered.
    #[must_use]
    pub fn store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        let component_type = self.registry.type_of::<T>()?;
        self.stores
            .get(component_type.index)
            .and_then(|store| store.downcast_ref::<T>().ok())
    }

    /// Typed mutable store for a registered type.
    pub fn store_mut<T: Component>(
        &mut self,
        component_type: ComponentType,
    ) -> Result<&mut ComponentStore<T>, ComponentError> {
        match self.stores.get_mut(component_type.index) {
            Some(store) => store.downcast_mut::<T>(),
            None => Err(ComponentError::TypeMismatch {
                component: component_type.name,
            }),
        }
    }

    /// Type-erased store at `index`.
    #[must_use]
    pub fn erased(&self, index: usize) -> Option<&(dyn ErasedStore + 'static)> {
        self.stores.get(index).map(|store| &**store)
    }

    /// Mutable type-erased store at `index`.
    pub fn erased_mut(&mut self, index: usize) -> Option<&mut (dyn ErasedStore + 'static)> {
        self.stores.get_mut(index).map(|store| &mut **store)
    }

    /// Current composition identity of `entity`.
    #[must_use]
    pub fn identity(&self, entity: Entity) -> CompositionId {
        self.entity_identity
            .get(entity.index())
            .copied()
            .unwrap_or(CompositionId::EMPTY)
    }

    /// Record the composition identity of `entity`.
    pub fn set_identity(&mut self, entity: Entity, id: CompositionId) {
        let index = entity.index();
        if index >= self.entity_identity.len() {
            self.entity_identity.resize(index + 1, CompositionId::EMPTY);
        }
        self.entity_identity[index] = id;
    }

    /// Composition bit set of `entity`.
    #[must_use]
    pub fn composition_bits(&self, entity: Entity) -> Option<&BitVector> {
        self.identities
            .composition(self.identity(entity))
            .map(|composition| composition.bits())
    }

    /// Component types owned by `entity`.
    #[must_use]
    pub fn composition_types(&self, entity: Entity) -> &[ComponentType] {
        self.identities
            .composition(self.identity(entity))
            .map(|composition| composition.types())
            .unwrap_or_default()
    }

    /// Intern a composition bit set.
    pub fn intern(&mut self, bits: &BitVector) -> Interned {
        self.identities.intern(bits, &self.registry)
    }

    /// The identity resolver.
    #[must_use]
    pub fn identities(&self) -> &CompositionIdentityResolver {
        &self.identities
    }

    /// Strip every component from reclaimed entities and reset their identity.
    ///
    /// Removal goes through each store's remover without touching any
    /// subscription. Types whose delayed store now needs a purge are pushed
    /// onto `purgatories`.
    pub fn clean(&mut self, entities: &[Entity], purgatories: &mut Vec<usize>) {
        for &entity in entities {
            let id = self.identity(entity);
            let Some(composition) = self.identities.composition(id) else {
                continue;
            };
            for component_type in composition.types() {
                if let Some(store) = self.stores.get_mut(component_type.index) {
                    if store.internal_remove(entity) {
                        purgatories.push(component_type.index);
                    }
                }
            }
            self.set_identity(entity, CompositionId::EMPTY);
        }
    }
}

impl std::fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentManager")
            .field("types", &self.registry.len())
            .field("compositions", &self.identities.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
