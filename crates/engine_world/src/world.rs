//! The world: entities, their components, and the subscriptions over them.
//!
//! Structural changes made through a [`World`] are applied to the component
//! stores immediately but only become visible to subscriptions when the world
//! converges, either explicitly through
//! [`process_pending_changes`](World::process_pending_changes) or between
//! systems inside [`process`](World::process).

use std::fmt;
use std::mem;

use engine_component::{
    AspectBuilder, BitVector, Component, ComponentError, ComponentType, Entity, EntityAllocator,
};
use tracing::{debug, trace};

use crate::archetype::Archetype;
use crate::batch::BatchChangeProcessor;
use crate::components::ComponentManager;
use crate::config::WorldConfiguration;
use crate::edit::EntityEdit;
use crate::error::{AggregateError, WorldError};
use crate::identity::CompositionId;
use crate::mapper::ComponentMapper;
use crate::subscription::{EntitySubscription, SubscriptionDelta, SubscriptionId};
use crate::subscription_manager::AspectSubscriptionManager;
use crate::system::System;
use crate::transmuter::EntityTransmuter;

/// Which single-type transmuter to run.
#[derive(Debug, Clone, Copy)]
enum TypeDelta {
    Create,
    Remove,
}

/// Single-type transmuters used for bookkeeping after a store has already
/// created or removed the component itself.
#[derive(Debug)]
struct TypeTransmuters {
    create: EntityTransmuter,
    remove: EntityTransmuter,
}

/// A registered system. The system itself is taken out while it runs; its
/// name and flag stay here so it can be toggled from inside `process`.
struct SystemEntry {
    name: String,
    enabled: bool,
    system: Option<Box<dyn System>>,
}

/// Owns every entity, component store and subscription of one simulation.
pub struct World {
    pub(crate) components: ComponentManager,
    pub(crate) batch: BatchChangeProcessor,
    pub(crate) entities: EntityAllocator,
    pub(crate) subscriptions: AspectSubscriptionManager,
    config: WorldConfiguration,
    type_transmuters: Vec<TypeTransmuters>,
    systems: Vec<SystemEntry>,
}

impl World {
    /// Create a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfiguration::default())
    }

    /// Create a world from `config`.
    #[must_use]
    pub fn with_config(config: WorldConfiguration) -> Self {
        let capacity = config.expected_entity_count;
        let mut world = Self {
            components: ComponentManager::new(capacity, config.always_delay_component_removal),
            batch: BatchChangeProcessor::with_capacity(capacity),
            entities: EntityAllocator::with_capacity(capacity),
            subscriptions: AspectSubscriptionManager::new(),
            config,
            type_transmuters: Vec::new(),
            systems: Vec::new(),
        };
        world.subscribe(&AspectBuilder::new());
        debug!(
            expected_entity_count = capacity,
            always_delay_component_removal = world.config.always_delay_component_removal,
            "world created"
        );
        world
    }

    /// The configuration the world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfiguration {
        &self.config
    }

    /// Component stores and composition identities.
    #[must_use]
    pub fn components(&self) -> &ComponentManager {
        &self.components
    }

    /// Pending-change bookkeeping.
    #[must_use]
    pub fn batch(&self) -> &BatchChangeProcessor {
        &self.batch
    }

    /// Every subscription, the universal one first.
    #[must_use]
    pub fn subscriptions(&self) -> &AspectSubscriptionManager {
        &self.subscriptions
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Allocate an entity with no components.
    pub fn create(&mut self) -> Entity {
        let entity = self.entities.allocate();
        self.components.set_identity(entity, CompositionId::EMPTY);
        self.batch.mark_changed(entity);
        entity
    }

    /// Allocate an entity populated with the components of `archetype`.
    ///
    /// If a component cannot be constructed the entity is deleted again and
    /// the error is returned.
    pub fn create_from(&mut self, archetype: &Archetype) -> Result<Entity, WorldError> {
        let entity = self.create();
        let operation = archetype.operation();
        self.components.set_identity(entity, operation.composition());
        if let Err(err) = operation.perform(self, entity) {
            self.batch.delete(entity);
            return Err(err);
        }
        Ok(entity)
    }

    /// Queue `entity` for deletion.
    ///
    /// The entity becomes inactive at once. Subscriptions drop it at the next
    /// convergence round; its components and id are reclaimed at the end of
    /// [`process`](Self::process).
    pub fn delete(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.ensure_active(entity, "delete")?;
        self.batch.delete(entity);
        Ok(())
    }

    /// Returns `true` if `entity` is allocated and not queued for deletion.
    #[must_use]
    pub fn is_active(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity) && !self.batch.is_deleted(entity)
    }

    /// Number of allocated entities, including those awaiting reclaim.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.count()
    }

    /// Start editing `entity`.
    pub fn edit(&mut self, entity: Entity) -> Result<EntityEdit<'_>, WorldError> {
        self.ensure_active(entity, "edit")?;
        let slot = self.batch.obtain_editor(entity);
        Ok(EntityEdit::new(self, entity, slot))
    }

    pub(crate) fn ensure_active(
        &self,
        entity: Entity,
        operation: &'static str,
    ) -> Result<(), WorldError> {
        if self.is_active(entity) {
            Ok(())
        } else {
            Err(WorldError::InactiveEntity { entity, operation })
        }
    }

    // ------------------------------------------------------------------
    // Compositions
    // ------------------------------------------------------------------

    /// Intern `bits`, announcing a new identity to every subscription.
    pub fn composition_identity(&mut self, bits: &BitVector) -> CompositionId {
        let interned = self.components.intern(bits);
        if interned.fresh {
            self.subscriptions.process_component_identity(interned.id, bits);
        }
        interned.id
    }

    /// Current composition identity of `entity`.
    #[must_use]
    pub fn composition_id(&self, entity: Entity) -> CompositionId {
        self.components.identity(entity)
    }

    /// Component types `entity` currently owns, by ascending index.
    #[must_use]
    pub fn component_types_of(&self, entity: Entity) -> &[ComponentType] {
        self.components.composition_types(entity)
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// The registered type of `T`, registering it on first use.
    pub fn component_type<T: Component>(&mut self) -> ComponentType {
        let component_type = self.components.registry_mut().register::<T>();
        self.sync_component_types();
        component_type
    }

    /// Typed handle to the store of `T`.
    pub fn mapper<T: Component>(&mut self) -> ComponentMapper<T> {
        ComponentMapper::new(self.component_type::<T>())
    }

    /// Create stores and single-type transmuters for every type registered
    /// since the last call.
    pub(crate) fn sync_component_types(&mut self) {
        self.components.sync_stores();
        for index in self.type_transmuters.len()..self.components.registry().len() {
            let bit: BitVector = std::iter::once(index).collect();
            self.type_transmuters.push(TypeTransmuters {
                create: EntityTransmuter::from_bits(bit.clone(), BitVector::new()),
                remove: EntityTransmuter::from_bits(BitVector::new(), bit),
            });
        }
    }

    /// The entity's `T`, including one pending delayed removal.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.components.store::<T>()?.get(entity)
    }

    /// Mutable access to the entity's `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let component_type = self.components.registry().type_of::<T>()?;
        self.components
            .store_mut::<T>(component_type)
            .ok()?
            .get_mut(entity)
    }

    /// Returns `true` if the active `entity` owns `T` and it is not pending
    /// removal.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.is_active(entity)
            && self
                .components
                .store::<T>()
                .is_some_and(|store| store.has(entity))
    }

    /// Create `T` on `entity`, or return the one it already owns.
    ///
    /// Re-creating a component whose delayed removal is still pending
    /// cancels the removal and installs a fresh instance.
    pub fn create_component<T: Component>(&mut self, entity: Entity) -> Result<&mut T, WorldError> {
        self.ensure_active(entity, "create a component on")?;
        let component_type = self.component_type::<T>();
        let store = self.components.store_mut::<T>(component_type)?;
        if store.prepare_create(entity) {
            store.install_new(entity)?;
            self.transmute_type(TypeDelta::Create, component_type.index, entity);
        }
        let store = self.components.store_mut::<T>(component_type)?;
        Ok(store.get_or_install(entity)?)
    }

    /// Attach `component` to `entity`, replacing any existing `T`.
    pub fn insert_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<&mut T, WorldError> {
        self.ensure_active(entity, "add a component to")?;
        if T::POOLED {
            return Err(ComponentError::PooledAdd {
                component: T::type_name(),
            }
            .into());
        }
        let component_type = self.component_type::<T>();
        let store = self.components.store_mut::<T>(component_type)?;
        if store.prepare_create(entity) {
            self.transmute_type(TypeDelta::Create, component_type.index, entity);
        }
        let store = self.components.store_mut::<T>(component_type)?;
        Ok(store.insert(entity, component))
    }

    /// Remove `T` from `entity` if present.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let component_type = self.component_type::<T>();
        self.remove_component_type(component_type, entity)
    }

    /// Remove the component of `component_type` from `entity` if present.
    pub fn remove_component_type(
        &mut self,
        component_type: ComponentType,
        entity: Entity,
    ) -> Result<(), WorldError> {
        self.ensure_active(entity, "remove a component from")?;
        let present = self
            .components
            .erased(component_type.index)
            .is_some_and(|store| store.has(entity));
        if !present {
            return Ok(());
        }
        self.transmute_type(TypeDelta::Remove, component_type.index, entity);
        if let Some(store) = self.components.erased_mut(component_type.index)
            && store.internal_remove(entity)
        {
            self.batch.schedule_purge(component_type.index);
        }
        Ok(())
    }

    fn type_transmuter(&mut self, delta: TypeDelta, index: usize) -> Option<&mut EntityTransmuter> {
        let transmuters = self.type_transmuters.get_mut(index)?;
        Some(match delta {
            TypeDelta::Create => &mut transmuters.create,
            TypeDelta::Remove => &mut transmuters.remove,
        })
    }

    fn transmute_type(&mut self, delta: TypeDelta, index: usize, entity: Entity) {
        let Some(slot) = self.type_transmuter(delta, index) else {
            return;
        };
        let mut transmuter = mem::take(slot);
        transmuter.transmute_no_op(self, entity);
        if let Some(slot) = self.type_transmuter(delta, index) {
            *slot = transmuter;
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// The subscription for `builder`, created and synchronised on first
    /// request.
    ///
    /// Equal builders share one subscription. A new subscription already
    /// contains every live entity matching its aspect; those entities are
    /// not reported to listeners as insertions.
    pub fn subscribe(&mut self, builder: &AspectBuilder) -> SubscriptionId {
        if let Some(id) = self.subscriptions.find(builder) {
            return id;
        }

        let aspect = builder.build(self.components.registry_mut());
        self.sync_component_types();

        let mut subscription =
            EntitySubscription::new(aspect, builder.clone(), self.config.expected_entity_count);
        for (id, composition) in self.components.identities().iter() {
            subscription.process_component_identity(id, composition.bits());
        }
        for entity in self.entities.iter() {
            if !self.batch.is_deleted(entity) {
                subscription.check(entity, self.components.identity(entity));
            }
        }
        subscription.settle();

        let members = subscription.len();
        let id = self.subscriptions.insert(subscription);
        debug!(subscription = id.0, aspect = %builder, members, "subscription created");
        id
    }

    /// The subscription behind `id`.
    #[must_use]
    pub fn subscription(&self, id: SubscriptionId) -> Option<&EntitySubscription> {
        self.subscriptions.get(id)
    }

    /// Mutable access to the subscription behind `id`, for listener
    /// registration.
    pub fn subscription_mut(&mut self, id: SubscriptionId) -> Option<&mut EntitySubscription> {
        self.subscriptions.get_mut(id)
    }

    // ------------------------------------------------------------------
    // Convergence
    // ------------------------------------------------------------------

    /// Reconcile subscriptions with every pending change, repeating until
    /// listeners stop producing new ones.
    pub fn process_pending_changes(&mut self) {
        let mut rounds = 0_usize;
        while self.batch.has_pending() {
            rounds += 1;
            let round = self.batch.drain(&self.components);
            trace!(
                round = rounds,
                changed = round.changed.len(),
                deleted = round.deleted.len(),
                "convergence round"
            );
            for index in 0..self.subscriptions.len() {
                let id = SubscriptionId(index);
                if let Some(delta) = self.subscriptions.reconcile(id, &round.changed, &round.deleted)
                {
                    trace!(
                        subscription = index,
                        removed = delta.removed.len(),
                        inserted = delta.inserted.len(),
                        "subscription delta"
                    );
                    self.dispatch(id, &delta);
                }
            }
            self.purge_components();
        }
        self.batch.recycle_editors();
        if rounds > 0 {
            debug!(rounds, "pending changes converged");
        }
    }

    fn dispatch(&mut self, id: SubscriptionId, delta: &SubscriptionDelta) {
        let Some(subscription) = self.subscriptions.get_mut(id) else {
            return;
        };
        let mut listeners = subscription.take_listeners();
        for entry in &mut listeners {
            if entry.interest.removed && !delta.removed.is_empty() {
                entry.listener.removed(self, &delta.removed);
            }
            if entry.interest.inserted && !delta.inserted.is_empty() {
                entry.listener.inserted(self, &delta.inserted);
            }
        }
        if let Some(subscription) = self.subscriptions.get_mut(id) {
            subscription.restore_listeners(listeners);
        }
    }

    fn purge_components(&mut self) {
        for index in self.batch.take_purgatories() {
            if let Some(store) = self.components.erased_mut(index) {
                store.purge();
            }
        }
    }

    /// Strip and free every entity whose deletion has been observed by all
    /// subscriptions. Returns the number of reclaimed entities.
    pub fn reclaim_deleted(&mut self) -> usize {
        self.process_pending_changes();
        let reclaimed = self.batch.take_pending_purge();
        if reclaimed.is_empty() {
            return 0;
        }
        self.components
            .clean(&reclaimed, self.batch.purgatories_mut());
        self.entities.free(&reclaimed);
        self.purge_components();
        debug!(count = reclaimed.len(), "reclaimed deleted entities");
        reclaimed.len()
    }

    // ------------------------------------------------------------------
    // Systems
    // ------------------------------------------------------------------

    /// Initialize `system` and append it to the processing order.
    pub fn add_system<S: System + 'static>(&mut self, mut system: S) {
        system.initialize(self);
        let name = system.name().to_owned();
        debug!(system = %name, "system added");
        self.systems.push(SystemEntry {
            name,
            enabled: true,
            system: Some(Box::new(system)),
        });
    }

    /// Enable or disable every system called `name`. Returns `false` if no
    /// system has that name.
    ///
    /// Systems may call this while [`process`](Self::process) runs; a system
    /// later in the order is skipped or run in the same tick.
    pub fn set_system_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        for entry in self.systems.iter_mut().filter(|entry| entry.name == name) {
            entry.enabled = enabled;
            found = true;
        }
        found
    }

    /// Whether the system called `name` is enabled, if it exists.
    #[must_use]
    pub fn is_system_enabled(&self, name: &str) -> Option<bool> {
        self.systems
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.enabled)
    }

    /// Number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Run one tick: every enabled system in registration order, converging
    /// before each, then a final convergence and entity reclaim.
    ///
    /// Systems added while the tick runs first run on the next tick.
    pub fn process(&mut self) {
        for index in 0..self.systems.len() {
            let Some(entry) = self.systems.get_mut(index) else {
                break;
            };
            if !entry.enabled {
                continue;
            }
            let Some(mut system) = entry.system.take() else {
                continue;
            };
            self.process_pending_changes();
            system.process(self);
            if let Some(entry) = self.systems.get_mut(index) {
                entry.system = Some(system);
            }
        }

        self.reclaim_deleted();
    }

    /// Dispose every system, collecting all failures.
    pub fn dispose(&mut self) -> Result<(), WorldError> {
        let mut errors = AggregateError::new();
        for entry in mem::take(&mut self.systems) {
            if let Some(mut system) = entry.system
                && let Err(err) = system.dispose()
            {
                errors.push(entry.name, err);
            }
        }
        debug!(failures = errors.len(), "world disposed");
        Ok(errors.into_result()?)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.count())
            .field("components", &self.components)
            .field("subscriptions", &self.subscriptions.len())
            .field("systems", &self.systems.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use engine_component::BoxError;

    use super::*;
    use crate::subscription::{ListenerInterest, SubscriptionListener};

    macro_rules! marker {
        ($name:ident) => {
            #[derive(Debug, Default, PartialEq)]
            struct $name;
            impl Component for $name {
                fn type_name() -> &'static str {
                    stringify!($name)
                }
                fn instantiate() -> Result<Self, BoxError> {
                    Ok(Self)
                }
            }
        };
    }

    marker!(X);
    marker!(Y);
    marker!(Doomed);

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {
        const DELAYED_REMOVAL: bool = true;

        fn type_name() -> &'static str {
            "Health"
        }
        fn instantiate() -> Result<Self, BoxError> {
            Ok(Self(10))
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

    #[derive(Debug, Default)]
    struct Log {
        inserted: Vec<Vec<Entity>>,
        removed: Vec<Vec<Entity>>,
    }

    struct Recorder(Rc<RefCell<Log>>);

    impl SubscriptionListener for Recorder {
        fn inserted(&mut self, _world: &mut World, entities: &[Entity]) {
            self.0.borrow_mut().inserted.push(entities.to_vec());
        }

        fn removed(&mut self, _world: &mut World, entities: &[Entity]) {
            self.0.borrow_mut().removed.push(entities.to_vec());
        }
    }

    fn record(world: &mut World, id: SubscriptionId) -> Rc<RefCell<Log>> {
        let log = Rc::new(RefCell::new(Log::default()));
        world
            .subscription_mut(id)
            .unwrap()
            .add_listener(Box::new(Recorder(Rc::clone(&log))));
        log
    }

    fn members(world: &World, id: SubscriptionId) -> Vec<Entity> {
        world.subscription(id).unwrap().entities().to_vec()
    }

    #[test]
    fn test_removal_fires_exactly_one_event() {
        let mut world = World::new();
        let with_x = world.subscribe(&AspectBuilder::new().all::<X>());
        let log = record(&mut world, with_x);

        let a = world.create();
        world.create_component::<X>(a).unwrap();
        let b = world.create();
        world.create_component::<X>(b).unwrap();
        world.process_pending_changes();

        assert_eq!(members(&world, with_x), vec![a, b]);
        assert_eq!(log.borrow().inserted, vec![vec![a, b]]);

        world.remove_component::<X>(a).unwrap();
        world.process_pending_changes();

        assert_eq!(members(&world, with_x), vec![b]);
        assert_eq!(log.borrow().removed, vec![vec![a]]);
        assert_eq!(log.borrow().inserted.len(), 1);
    }

    #[test]
    fn test_net_unchanged_composition_is_silent() {
        let mut world = World::new();
        let with_x = world.subscribe(&AspectBuilder::new().all::<X>());
        let a = world.create();
        let b = world.create();
        world.create_component::<X>(b).unwrap();
        world.process_pending_changes();
        let log = record(&mut world, with_x);

        world.create_component::<X>(a).unwrap();
        world.remove_component::<X>(a).unwrap();
        world.insert_component(b, X).unwrap();
        world.process_pending_changes();

        assert!(log.borrow().inserted.is_empty());
        assert!(log.borrow().removed.is_empty());
        assert_eq!(members(&world, with_x), vec![b]);
    }

    #[test]
    fn test_late_subscription_sees_existing_entities() {
        let mut world = World::new();
        let a = world.create();
        world.create_component::<X>(a).unwrap();
        let b = world.create();
        world.create_component::<Y>(b).unwrap();
        world.process_pending_changes();

        let with_x = world.subscribe(&AspectBuilder::new().all::<X>());
        assert_eq!(members(&world, with_x), vec![a]);

        let log = record(&mut world, with_x);
        world.process_pending_changes();
        assert!(log.borrow().inserted.is_empty());
    }

    #[test]
    fn test_subscriptions_are_memoised_by_builder() {
        let mut world = World::new();
        let first = world.subscribe(&AspectBuilder::new().all::<X>().exclude::<Y>());
        let second = world.subscribe(&AspectBuilder::new().exclude::<Y>().all::<X>());
        assert_eq!(first, second);
        assert_eq!(world.subscriptions().len(), 2);
    }

    #[test]
    fn test_empty_entities_match_universal_and_exclude_only() {
        let mut world = World::new();
        let without_x = world.subscribe(&AspectBuilder::new().exclude::<X>());
        let e = world.create();
        world.process_pending_changes();

        assert!(world.subscription(SubscriptionId(0)).unwrap().contains(e));
        assert!(world.subscription(without_x).unwrap().contains(e));
    }

    struct HealthReader {
        seen: Rc<RefCell<Vec<Option<u32>>>>,
    }

    impl SubscriptionListener for HealthReader {
        fn removed(&mut self, world: &mut World, entities: &[Entity]) {
            let mut seen = self.seen.borrow_mut();
            for &entity in entities {
                seen.push(world.get::<Health>(entity).map(|health| health.0));
            }
        }
    }

    type Deliveries = Rc<RefCell<Vec<(&'static str, &'static str, Vec<Entity>)>>>;

    struct OrderLog {
        label: &'static str,
        deliveries: Deliveries,
    }

    impl SubscriptionListener for OrderLog {
        fn inserted(&mut self, _world: &mut World, entities: &[Entity]) {
            self.deliveries
                .borrow_mut()
                .push((self.label, "inserted", entities.to_vec()));
        }

        fn removed(&mut self, _world: &mut World, entities: &[Entity]) {
            self.deliveries
                .borrow_mut()
                .push((self.label, "removed", entities.to_vec()));
        }
    }

    #[test]
    fn test_removed_delivered_before_inserted_in_one_round() {
        let mut world = World::new();
        let with_x = world.subscribe(&AspectBuilder::new().all::<X>());
        let a = world.create();
        world.create_component::<X>(a).unwrap();
        let b = world.create();
        world.process_pending_changes();

        let deliveries = Deliveries::default();
        for label in ["first", "second"] {
            world
                .subscription_mut(with_x)
                .unwrap()
                .add_listener(Box::new(OrderLog {
                    label,
                    deliveries: Rc::clone(&deliveries),
                }));
        }

        world.remove_component::<X>(a).unwrap();
        world.create_component::<X>(b).unwrap();
        world.process_pending_changes();

        assert_eq!(
            *deliveries.borrow(),
            vec![
                ("first", "removed", vec![a]),
                ("first", "inserted", vec![b]),
                ("second", "removed", vec![a]),
                ("second", "inserted", vec![b]),
            ]
        );
        assert_eq!(members(&world, with_x), vec![b]);

        world.process_pending_changes();
        assert_eq!(deliveries.borrow().len(), 4);
    }

    #[test]
    fn test_deleted_entity_evicted_but_readable_until_reclaim() {
        let mut world = World::new();
        let with_health = world.subscribe(&AspectBuilder::new().all::<Health>());
        let seen = Rc::new(RefCell::new(Vec::new()));
        world.subscription_mut(with_health).unwrap().add_listener_with(
            Box::new(HealthReader {
                seen: Rc::clone(&seen),
            }),
            ListenerInterest::REMOVED,
        );

        let e = world.create();
        world.create_component::<Health>(e).unwrap().0 = 5;
        world.process_pending_changes();

        world.delete(e).unwrap();
        assert!(!world.is_active(e));
        assert!(!world.has::<Health>(e));
        assert_eq!(world.get::<Health>(e), Some(&Health(5)));

        world.process_pending_changes();
        assert!(members(&world, with_health).is_empty());
        assert_eq!(*seen.borrow(), vec![Some(5)]);

        assert_eq!(world.reclaim_deleted(), 1);
        assert_eq!(world.get::<Health>(e), None);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_reclaimed_ids_are_reused_clean() {
        let mut world = World::new();
        let e = world.create();
        world.create_component::<X>(e).unwrap();
        world.delete(e).unwrap();
        world.process();

        let reused = world.create();
        assert_eq!(reused, e);
        assert_eq!(world.composition_id(reused), CompositionId::EMPTY);
        assert!(!world.has::<X>(reused));
        assert!(world.component_types_of(reused).is_empty());
    }

    #[test]
    fn test_pooled_component_is_reset_on_reuse() {
        let mut world = World::new();
        let a = world.create();
        world.create_component::<Trail>(a).unwrap().length = 42;
        world.remove_component::<Trail>(a).unwrap();
        world.process_pending_changes();
        assert_eq!(world.get::<Trail>(a), None);

        let b = world.create();
        assert_eq!(world.create_component::<Trail>(b).unwrap(), &mut Trail { length: 0 });
    }

    #[test]
    fn test_recreate_cancels_pending_removal() {
        let mut world = World::new();
        let with_health = world.subscribe(&AspectBuilder::new().all::<Health>());
        let e = world.create();
        world.create_component::<Health>(e).unwrap().0 = 3;
        world.process_pending_changes();
        let log = record(&mut world, with_health);

        world.remove_component::<Health>(e).unwrap();
        assert_eq!(world.create_component::<Health>(e).unwrap(), &mut Health(10));
        world.process_pending_changes();

        assert!(world.has::<Health>(e));
        assert!(log.borrow().removed.is_empty());
        assert!(log.borrow().inserted.is_empty());
    }

    struct Tagger;

    impl SubscriptionListener for Tagger {
        fn inserted(&mut self, world: &mut World, entities: &[Entity]) {
            for &entity in entities {
                world.create_component::<Y>(entity).unwrap();
            }
        }
    }

    struct Reaper;

    impl SubscriptionListener for Reaper {
        fn inserted(&mut self, world: &mut World, entities: &[Entity]) {
            for &entity in entities {
                world.delete(entity).unwrap();
            }
        }
    }

    #[test]
    fn test_listener_changes_converge_in_one_call() {
        let mut world = World::new();
        let with_x = world.subscribe(&AspectBuilder::new().all::<X>());
        world.subscription_mut(with_x).unwrap().add_listener(Box::new(Tagger));
        let with_y = world.subscribe(&AspectBuilder::new().all::<Y>());
        let doomed = world.subscribe(&AspectBuilder::new().all::<Doomed>());
        world.subscription_mut(doomed).unwrap().add_listener(Box::new(Reaper));
        let universal = record(&mut world, SubscriptionId(0));

        let a = world.create();
        world.create_component::<X>(a).unwrap();
        let b = world.create();
        world.create_component::<Doomed>(b).unwrap();
        world.process_pending_changes();

        assert!(!world.batch().has_pending());
        assert_eq!(members(&world, with_y), vec![a]);
        assert!(members(&world, doomed).is_empty());
        assert!(!world.is_active(b));
        assert_eq!(universal.borrow().removed, vec![vec![b]]);
    }

    #[test]
    fn test_inactive_entities_reject_mutation() {
        let mut world = World::new();
        let e = world.create();
        world.delete(e).unwrap();

        assert!(matches!(
            world.delete(e),
            Err(WorldError::InactiveEntity { operation: "delete", .. })
        ));
        assert!(world.create_component::<X>(e).is_err());
        assert!(world.remove_component::<X>(e).is_err());
        assert!(world.create_component::<X>(Entity(99)).is_err());
    }

    #[test]
    fn test_always_delay_keeps_plain_components_readable() {
        let config = WorldConfiguration::new().with_always_delay_component_removal(true);
        let mut world = World::with_config(config);
        let e = world.create();
        world.create_component::<X>(e).unwrap();
        world.process_pending_changes();

        world.remove_component::<X>(e).unwrap();
        assert!(!world.has::<X>(e));
        assert_eq!(world.get::<X>(e), Some(&X));
        world.process_pending_changes();
        assert_eq!(world.get::<X>(e), None);
    }

    struct Counter {
        name: &'static str,
        ticks: Rc<Cell<u32>>,
        fail_dispose: bool,
    }

    impl Counter {
        fn new(name: &'static str, fail_dispose: bool) -> (Self, Rc<Cell<u32>>) {
            let ticks = Rc::new(Cell::new(0));
            let counter = Self {
                name,
                ticks: Rc::clone(&ticks),
                fail_dispose,
            };
            (counter, ticks)
        }
    }

    impl System for Counter {
        fn name(&self) -> &str {
            self.name
        }

        fn process(&mut self, _world: &mut World) {
            self.ticks.set(self.ticks.get() + 1);
        }

        fn dispose(&mut self) -> Result<(), BoxError> {
            if self.fail_dispose {
                Err(format!("{} still busy", self.name).into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_disabled_systems_are_skipped() {
        let mut world = World::new();
        let (physics, physics_ticks) = Counter::new("physics", false);
        let (audio, audio_ticks) = Counter::new("audio", false);
        world.add_system(physics);
        world.add_system(audio);

        world.process();
        assert!(world.set_system_enabled("audio", false));
        assert!(!world.set_system_enabled("missing", false));
        world.process();

        assert_eq!(physics_ticks.get(), 2);
        assert_eq!(audio_ticks.get(), 1);
        assert_eq!(world.is_system_enabled("audio"), Some(false));
        assert_eq!(world.system_count(), 2);
    }

    struct Pauser {
        target: &'static str,
        after: u32,
        ticks: u32,
    }

    impl System for Pauser {
        fn process(&mut self, world: &mut World) {
            self.ticks += 1;
            if self.ticks == self.after {
                assert!(world.set_system_enabled(self.target, false));
                assert_eq!(world.is_system_enabled(self.target), Some(false));
            }
        }
    }

    #[test]
    fn test_system_can_disable_another_mid_tick() {
        let mut world = World::new();
        let (worker, worker_ticks) = Counter::new("worker", false);
        world.add_system(Pauser {
            target: "worker",
            after: 2,
            ticks: 0,
        });
        world.add_system(worker);

        world.process();
        assert_eq!(worker_ticks.get(), 1);

        world.process();
        world.process();
        assert_eq!(worker_ticks.get(), 1);
        assert_eq!(world.is_system_enabled("worker"), Some(false));
        assert_eq!(world.system_count(), 2);

        assert!(world.set_system_enabled("worker", true));
        world.process();
        assert_eq!(worker_ticks.get(), 2);
    }

    struct Spawner;

    impl System for Spawner {
        fn process(&mut self, world: &mut World) {
            let e = world.create();
            world.create_component::<X>(e).unwrap();
        }
    }

    struct Watcher {
        with_x: SubscriptionId,
        seen: Rc<Cell<usize>>,
    }

    impl System for Watcher {
        fn process(&mut self, world: &mut World) {
            self.seen.set(world.subscription(self.with_x).unwrap().len());
        }
    }

    #[test]
    fn test_changes_converge_between_systems() {
        let mut world = World::new();
        let with_x = world.subscribe(&AspectBuilder::new().all::<X>());
        let seen = Rc::new(Cell::new(0));
        world.add_system(Spawner);
        world.add_system(Watcher {
            with_x,
            seen: Rc::clone(&seen),
        });

        world.process();
        assert_eq!(seen.get(), 1);
        world.process();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_dispose_collects_every_failure() {
        let mut world = World::new();
        world.add_system(Counter::new("physics", true).0);
        world.add_system(Counter::new("input", false).0);
        world.add_system(Counter::new("audio", true).0);

        let Err(WorldError::Dispose(errors)) = world.dispose() else {
            panic!("expected aggregated dispose failure");
        };
        let steps: Vec<&str> = errors.iter().map(|(step, _)| step).collect();
        assert_eq!(steps, vec!["physics", "audio"]);
        assert_eq!(world.system_count(), 0);
    }
}
