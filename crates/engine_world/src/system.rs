//! Units of per-tick work driven by [`World::process`].

use engine_component::{AspectBuilder, BoxError, Entity};

use crate::subscription::SubscriptionId;
use crate::world::World;

/// A unit of processing invoked once per [`World::process`] call.
///
/// Pending structural changes are converged before each system runs, so a
/// system always sees subscriptions that reflect every earlier system's edits.
pub trait System {
    /// Name used to enable, disable and report the system.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called once when the system is added to a world.
    fn initialize(&mut self, _world: &mut World) {}

    /// Called once per [`World::process`] while the system is enabled.
    fn process(&mut self, world: &mut World);

    /// Release resources held by the system.
    fn dispose(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Per-entity work over the members of one aspect.
///
/// Wrap it in an [`IteratingSystem`] to register it with a world.
pub trait EntityProcessor {
    /// Name used to enable, disable and report the owning system.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The aspect whose members are processed.
    fn aspect(&self) -> AspectBuilder;

    /// Called once after the subscription for [`aspect`](Self::aspect) exists.
    fn initialize(&mut self, _world: &mut World, _subscription: SubscriptionId) {}

    /// Called once per tick for every member of the subscription.
    fn process(&mut self, world: &mut World, entity: Entity);

    /// Release resources held by the processor.
    fn dispose(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A [`System`] that subscribes to its processor's aspect and feeds it
/// every matching entity each tick.
///
/// Members are snapshotted before the first call. Entities deleted while the
/// tick runs are skipped; entities that join only show up next tick.
pub struct IteratingSystem<P> {
    processor: P,
    subscription: Option<SubscriptionId>,
}

impl<P: EntityProcessor> IteratingSystem<P> {
    pub fn new(processor: P) -> Self {
        Self {
            processor,
            subscription: None,
        }
    }

    /// The backing subscription, once the system has been added to a world.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

impl<P: EntityProcessor> System for IteratingSystem<P> {
    fn name(&self) -> &str {
        self.processor.name()
    }

    fn initialize(&mut self, world: &mut World) {
        let subscription = world.subscribe(&self.processor.aspect());
        self.subscription = Some(subscription);
        self.processor.initialize(world, subscription);
    }

    fn process(&mut self, world: &mut World) {
        let Some(entities) = self
            .subscription
            .and_then(|id| world.subscription(id))
            .map(|subscription| subscription.entities().to_vec())
        else {
            return;
        };
        for entity in entities {
            if world.is_active(entity) {
                self.processor.process(world, entity);
            }
        }
    }

    fn dispose(&mut self) -> Result<(), BoxError> {
        self.processor.dispose()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use engine_component::Component;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Fuel(u32);
    impl Component for Fuel {
        fn type_name() -> &'static str {
            "Fuel"
        }
        fn instantiate() -> Result<Self, BoxError> {
            Ok(Self(2))
        }
    }

    struct Burner {
        visited: Rc<RefCell<Vec<Entity>>>,
        attached: Option<SubscriptionId>,
    }

    impl EntityProcessor for Burner {
        fn name(&self) -> &str {
            "burner"
        }

        fn aspect(&self) -> AspectBuilder {
            AspectBuilder::new().all::<Fuel>()
        }

        fn initialize(&mut self, _world: &mut World, subscription: SubscriptionId) {
            self.attached = Some(subscription);
        }

        fn process(&mut self, world: &mut World, entity: Entity) {
            self.visited.borrow_mut().push(entity);
            let Some(fuel) = world.get_mut::<Fuel>(entity) else {
                return;
            };
            fuel.0 -= 1;
            if fuel.0 == 0 {
                world.delete(entity).unwrap();
            }
        }
    }

    fn burner() -> (IteratingSystem<Burner>, Rc<RefCell<Vec<Entity>>>) {
        let visited = Rc::new(RefCell::new(Vec::new()));
        let system = IteratingSystem::new(Burner {
            visited: Rc::clone(&visited),
            attached: None,
        });
        (system, visited)
    }

    #[test]
    fn test_iterating_system_visits_every_member() {
        let mut world = World::new();
        let a = world.create();
        world.create_component::<Fuel>(a).unwrap();
        let bare = world.create();
        let (system, visited) = burner();
        world.add_system(system);

        world.process();
        assert_eq!(*visited.borrow(), vec![a]);
        assert!(!visited.borrow().contains(&bare));
        assert_eq!(world.get::<Fuel>(a), Some(&Fuel(1)));
        assert_eq!(world.is_system_enabled("burner"), Some(true));
    }

    #[test]
    fn test_iterating_system_subscribes_on_initialize() {
        let mut world = World::new();
        let (mut system, _) = burner();
        assert_eq!(system.subscription(), None);

        system.initialize(&mut world);
        let id = system.subscription().unwrap();
        assert_eq!(system.processor().attached, Some(id));
        assert_eq!(id, world.subscribe(&AspectBuilder::new().all::<Fuel>()));
    }

    #[test]
    fn test_deleted_members_leave_after_the_tick() {
        let mut world = World::new();
        let a = world.create();
        world.create_component::<Fuel>(a).unwrap();
        let (system, visited) = burner();
        world.add_system(system);

        world.process();
        world.process();
        assert_eq!(*visited.borrow(), vec![a, a]);
        assert!(!world.is_active(a));

        world.process();
        assert_eq!(visited.borrow().len(), 2);
    }

    struct Culler {
        victim: Entity,
        visited: Rc<RefCell<Vec<Entity>>>,
    }

    impl EntityProcessor for Culler {
        fn aspect(&self) -> AspectBuilder {
            AspectBuilder::new().all::<Fuel>()
        }

        fn process(&mut self, world: &mut World, entity: Entity) {
            self.visited.borrow_mut().push(entity);
            if entity != self.victim && world.is_active(self.victim) {
                world.delete(self.victim).unwrap();
            }
        }
    }

    #[test]
    fn test_entities_deleted_mid_tick_are_skipped() {
        let mut world = World::new();
        let a = world.create();
        world.create_component::<Fuel>(a).unwrap();
        let b = world.create();
        world.create_component::<Fuel>(b).unwrap();
        let visited = Rc::new(RefCell::new(Vec::new()));
        world.add_system(IteratingSystem::new(Culler {
            victim: b,
            visited: Rc::clone(&visited),
        }));

        world.process();
        assert_eq!(*visited.borrow(), vec![a]);
    }
}
