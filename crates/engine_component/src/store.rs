//! Dense per-type component storage.
//!
//! A [`ComponentStore`] holds one optional component per entity index. Each
//! (entity, type) pair moves through three states, reported by
//! [`ComponentStore::state`]:
//!
//! ```text
//! Present --mark--> PendingRemoval --purge--> Absent
//!    \_____________mark (immediate)___________/
//! ```
//!
//! Stores for delayed-removal types keep the value readable through
//! [`get`](ComponentStore::get) while it is pending removal, but
//! [`has`](ComponentStore::has) already reports `false`. Stores for other
//! types go straight to `Absent`.

use std::any::Any;

use crate::bits::BitVector;
use crate::component::{Component, ComponentType};
use crate::entity::Entity;
use crate::error::ComponentError;
use crate::pool::ComponentPool;

/// Lifecycle of one component slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// The entity owns the component.
    Present,
    /// Removal was requested; the value stays readable until purge.
    PendingRemoval,
    /// No value is stored.
    Absent,
}

/// When a removed component's slot is actually cleared.
#[derive(Debug)]
enum Remover {
    Immediate,
    Delayed { pending: BitVector },
}

/// Storage for every instance of component type `T`.
#[derive(Debug)]
pub struct ComponentStore<T> {
    component_type: ComponentType,
    slots: Vec<Option<T>>,
    remover: Remover,
    pool: Option<ComponentPool<T>>,
}

impl<T: Component> ComponentStore<T> {
    /// Create an empty store sized for `capacity` entities.
    #[must_use]
    pub fn new(component_type: ComponentType, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        let remover = if component_type.delayed_removal {
            Remover::Delayed {
                pending: BitVector::with_capacity(capacity),
            }
        } else {
            Remover::Immediate
        };
        Self {
            component_type,
            slots,
            remover,
            pool: component_type.pooled.then(ComponentPool::new),
        }
    }

    /// The type this store was registered for.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// The stored value, including one pending removal.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slots.get(entity.index()).and_then(Option::as_ref)
    }

    /// Mutable access to the stored value, including one pending removal.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slots.get_mut(entity.index()).and_then(Option::as_mut)
    }

    /// Returns `true` if the entity owns the component and it is not pending removal.
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.get(entity).is_some() && !self.is_pending_removal(entity)
    }

    /// Current lifecycle state of the entity's slot.
    #[must_use]
    pub fn state(&self, entity: Entity) -> SlotState {
        match self.get(entity) {
            None => SlotState::Absent,
            Some(_) if self.is_pending_removal(entity) => SlotState::PendingRemoval,
            Some(_) => SlotState::Present,
        }
    }

    fn is_pending_removal(&self, entity: Entity) -> bool {
        match &self.remover {
            Remover::Immediate => false,
            Remover::Delayed { pending } => pending.get(entity.index()),
        }
    }

    /// Prepare the slot for a new instance.
    ///
    /// Returns `true` when a new instance has to be installed: either the slot
    /// is empty, or a pending removal was cancelled. Returns `false` when the
    /// entity already owns the component.
    pub fn prepare_create(&mut self, entity: Entity) -> bool {
        self.get(entity).is_none() || self.unmark(entity)
    }

    /// Install a new instance, taken from the pool when the type is pooled.
    pub fn install_new(&mut self, entity: Entity) -> Result<&mut T, ComponentError> {
        let component = self.obtain()?;
        Ok(self.slot_mut(entity).insert(component))
    }

    /// The stored value, installing a new instance when the slot is empty.
    pub fn get_or_install(&mut self, entity: Entity) -> Result<&mut T, ComponentError> {
        let component = match self.slot_mut(entity).take() {
            Some(existing) => existing,
            None => self.obtain()?,
        };
        Ok(self.slot_mut(entity).insert(component))
    }

    fn obtain(&mut self) -> Result<T, ComponentError> {
        match self.pool.as_mut() {
            Some(pool) => pool.obtain(),
            None => T::instantiate().map_err(|source| ComponentError::Instantiation {
                component: T::type_name(),
                source,
            }),
        }
    }

    /// Store `component`, replacing whatever the slot held.
    pub fn insert(&mut self, entity: Entity, component: T) -> &mut T {
        if let Some(previous) = self.slot_mut(entity).take() {
            self.recycle(previous);
        }
        self.slot_mut(entity).insert(component)
    }

    /// Request removal.
    ///
    /// Returns `true` when this call gave a delayed store its first pending
    /// removal, meaning the store now has to be purged at the end of the round.
    pub fn mark(&mut self, entity: Entity) -> bool {
        let occupied = self.get(entity).is_some();
        if let Remover::Delayed { pending } = &mut self.remover {
            if !occupied {
                return false;
            }
            let first = pending.is_empty();
            pending.set(entity.index());
            return first;
        }

        if let Some(component) = self.slots.get_mut(entity.index()).and_then(Option::take) {
            self.recycle(component);
        }
        false
    }

    /// Cancel a pending removal, recycling the stale value.
    ///
    /// Returns `true` if a removal was pending.
    pub fn unmark(&mut self, entity: Entity) -> bool {
        let Remover::Delayed { pending } = &mut self.remover else {
            return false;
        };
        if !pending.get(entity.index()) {
            return false;
        }
        pending.unset(entity.index());
        if let Some(component) = self.slots.get_mut(entity.index()).and_then(Option::take) {
            self.recycle(component);
        }
        true
    }

    /// Clear every slot pending removal.
    pub fn purge(&mut self) {
        let Remover::Delayed { pending } = &mut self.remover else {
            return;
        };
        for index in pending.drain() {
            if let Some(component) = self.slots.get_mut(index).and_then(Option::take) {
                self.recycle(component);
            }
        }
    }

    /// Number of recycled instances waiting in the pool.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.pool.as_ref().map_or(0, ComponentPool::len)
    }

    fn recycle(&mut self, component: T) {
        if let Some(pool) = self.pool.as_mut() {
            pool.free(component);
        }
    }

    fn slot_mut(&mut self, entity: Entity) -> &mut Option<T> {
        let index = entity.index();
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        &mut self.slots[index]
    }
}

/// Type-erased view of a [`ComponentStore`], used wherever stores are
/// addressed by bit index rather than by Rust type.
pub trait ErasedStore: Any {
    /// The type this store was registered for.
    fn component_type(&self) -> ComponentType;

    /// See [`ComponentStore::has`].
    fn has(&self, entity: Entity) -> bool;

    /// See [`ComponentStore::state`].
    fn state(&self, entity: Entity) -> SlotState;

    /// Ensure the entity owns a component, installing a new one if needed.
    fn internal_create(&mut self, entity: Entity) -> Result<(), ComponentError>;

    /// See [`ComponentStore::mark`].
    fn internal_remove(&mut self, entity: Entity) -> bool;

    /// See [`ComponentStore::purge`].
    fn purge(&mut self);

    /// Upcast for downcasting to the concrete store.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete store.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn component_type(&self) -> ComponentType {
        self.component_type
    }

    fn has(&self, entity: Entity) -> bool {
        ComponentStore::has(self, entity)
    }

    fn state(&self, entity: Entity) -> SlotState {
        ComponentStore::state(self, entity)
    }

    fn internal_create(&mut self, entity: Entity) -> Result<(), ComponentError> {
        if self.prepare_create(entity) {
            self.install_new(entity)?;
        }
        Ok(())
    }

    fn internal_remove(&mut self, entity: Entity) -> bool {
        self.mark(entity)
    }

    fn purge(&mut self) {
        ComponentStore::purge(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn ErasedStore {
    /// Downcast to the concrete store for `T`.
    pub fn downcast_ref<T: Component>(&self) -> Result<&ComponentStore<T>, ComponentError> {
        let component = self.component_type().name;
        self.as_any()
            .downcast_ref::<ComponentStore<T>>()
            .ok_or(ComponentError::TypeMismatch { component })
    }

    /// Mutable downcast to the concrete store for `T`.
    pub fn downcast_mut<T: Component>(&mut self) -> Result<&mut ComponentStore<T>, ComponentError> {
        let component = self.component_type().name;
        self.as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .ok_or(ComponentError::TypeMismatch { component })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentTypeRegistry;
    use crate::error::BoxError;

    #[derive(Debug, Default, PartialEq)]
    struct Position {
        x: f32,
    }

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
        fn instantiate() -> Result<Self, BoxError> {
            Ok(Self::default())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Trail {
        length: u32,
    }

    impl Component for Trail {
        const POOLED: bool = true;
        const DELAYED_REMOVAL: bool = true;

        fn type_name() -> &'static str {
            "Trail"
        }
        fn instantiate() -> Result<Self, BoxError> {
            Ok(Self::default())
        }
        fn reset(&mut self) {
            self.length = 0;
        }
    }

    fn store<T: Component>() -> ComponentStore<T> {
        let mut registry = ComponentTypeRegistry::new();
        ComponentStore::new(registry.register::<T>(), 4)
    }

    #[test]
    fn test_install_and_get() {
        let mut positions = store::<Position>();
        let e = Entity(2);
        assert_eq!(positions.state(e), SlotState::Absent);

        positions.install_new(e).unwrap().x = 3.0;
        assert!(positions.has(e));
        assert_eq!(positions.get(e), Some(&Position { x: 3.0 }));
        assert_eq!(positions.state(e), SlotState::Present);
    }

    #[test]
    fn test_slots_grow_past_initial_capacity() {
        let mut positions = store::<Position>();
        let far = Entity(100);
        positions.install_new(far).unwrap();
        assert!(positions.has(far));
        assert!(!positions.has(Entity(99)));
    }

    #[test]
    fn test_immediate_mark_clears_slot() {
        let mut positions = store::<Position>();
        let e = Entity(0);
        positions.install_new(e).unwrap();

        assert!(!positions.mark(e));
        assert_eq!(positions.get(e), None);
        assert_eq!(positions.state(e), SlotState::Absent);
        assert!(!positions.unmark(e));
    }

    #[test]
    fn test_delayed_mark_keeps_value_until_purge() {
        let mut trails = store::<Trail>();
        let e = Entity(1);
        trails.install_new(e).unwrap().length = 9;

        assert!(trails.mark(e));
        assert!(!trails.has(e));
        assert_eq!(trails.get(e), Some(&Trail { length: 9 }));
        assert_eq!(trails.state(e), SlotState::PendingRemoval);

        trails.purge();
        assert_eq!(trails.get(e), None);
        assert_eq!(trails.state(e), SlotState::Absent);
    }

    #[test]
    fn test_only_first_delayed_mark_requests_purge() {
        let mut trails = store::<Trail>();
        trails.install_new(Entity(0)).unwrap();
        trails.install_new(Entity(1)).unwrap();

        assert!(trails.mark(Entity(0)));
        assert!(!trails.mark(Entity(1)));
        assert!(!trails.mark(Entity(3)));

        trails.purge();
        trails.install_new(Entity(0)).unwrap();
        assert!(trails.mark(Entity(0)));
    }

    #[test]
    fn test_unmark_cancels_pending_removal() {
        let mut trails = store::<Trail>();
        let e = Entity(0);
        trails.install_new(e).unwrap().length = 4;
        trails.mark(e);

        assert!(trails.prepare_create(e));
        assert_eq!(trails.get(e), None);
        assert_eq!(trails.pooled(), 1);

        trails.install_new(e).unwrap();
        assert_eq!(trails.state(e), SlotState::Present);
        trails.purge();
        assert!(trails.has(e));
    }

    #[test]
    fn test_get_or_install_keeps_existing_value() {
        let mut positions = store::<Position>();
        let e = Entity(0);
        positions.get_or_install(e).unwrap().x = 2.0;
        assert_eq!(positions.get_or_install(e).unwrap(), &Position { x: 2.0 });
    }

    #[test]
    fn test_prepare_create_on_present_component_is_false() {
        let mut positions = store::<Position>();
        let e = Entity(0);
        positions.install_new(e).unwrap();
        assert!(!positions.prepare_create(e));
    }

    #[test]
    fn test_pooled_instance_is_reset_after_purge() {
        let mut trails = store::<Trail>();
        let first = Entity(0);
        trails.install_new(first).unwrap().length = 42;
        trails.mark(first);
        trails.purge();
        assert_eq!(trails.pooled(), 1);

        let second = Entity(1);
        assert_eq!(trails.install_new(second).unwrap(), &Trail { length: 0 });
        assert_eq!(trails.pooled(), 0);
    }

    #[test]
    fn test_erased_store_downcasts() {
        let mut erased: Box<dyn ErasedStore> = Box::new(store::<Position>());
        erased.internal_create(Entity(1)).unwrap();
        assert!(erased.has(Entity(1)));
        assert!(erased.downcast_ref::<Position>().is_ok());
        assert!(matches!(
            erased.downcast_mut::<Trail>(),
            Err(ComponentError::TypeMismatch { component: "Position" })
        ));
        assert!(!erased.internal_remove(Entity(1)));
        assert!(!erased.has(Entity(1)));
    }
}
