//! Demonstration systems.
//!
//! Entities spawn from an archetype, drift by their velocity and expire once
//! their lifetime runs out. A listener on the universal subscription counts
//! every entity that enters or leaves the world.

use std::cell::Cell;
use std::rc::Rc;

use engine_component::{AspectBuilder, BoxError, Component, Entity};
use engine_world::{
    Archetype, ArchetypeBuilder, ComponentMapper, EntityProcessor, IteratingSystem,
    ListenerInterest, SubscriptionId, SubscriptionListener, System, World,
};
use tracing::{debug, warn};

/// Location in the plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Component for Position {
    const POOLED: bool = true;

    fn type_name() -> &'static str {
        "Position"
    }

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::default())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Displacement per simulated second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub dx: f64,
    pub dy: f64,
}

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::default())
    }
}

/// Ticks left before the entity is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifetime {
    pub remaining: u32,
}

impl Component for Lifetime {
    const DELAYED_REMOVAL: bool = true;

    fn type_name() -> &'static str {
        "Lifetime"
    }

    fn instantiate() -> Result<Self, BoxError> {
        Ok(Self::default())
    }
}

/// Tunables of the demonstration.
#[derive(Debug, Clone, Copy)]
pub struct DemoConfig {
    /// Entities spawned per tick.
    pub spawn_per_tick: usize,
    /// Ticks each entity lives.
    pub lifetime_ticks: u32,
    /// Simulated seconds per tick.
    pub step: f64,
}

impl DemoConfig {
    #[must_use]
    pub fn new(step: f64) -> Self {
        Self {
            spawn_per_tick: 4,
            lifetime_ticks: 90,
            step,
        }
    }
}

/// Running totals of entities entering and leaving the world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    pub inserted: usize,
    pub removed: usize,
}

struct ActivityLogger {
    activity: Rc<Cell<Activity>>,
}

impl SubscriptionListener for ActivityLogger {
    fn inserted(&mut self, _world: &mut World, entities: &[Entity]) {
        let mut activity = self.activity.get();
        activity.inserted += entities.len();
        self.activity.set(activity);
        debug!(count = entities.len(), "entities entered the world");
    }

    fn removed(&mut self, _world: &mut World, entities: &[Entity]) {
        let mut activity = self.activity.get();
        activity.removed += entities.len();
        self.activity.set(activity);
        debug!(count = entities.len(), "entities left the world");
    }
}

/// Creates entities from a fixed archetype.
pub struct SpawnSystem {
    archetype: Archetype,
    velocity: ComponentMapper<Velocity>,
    lifetime: ComponentMapper<Lifetime>,
    per_tick: usize,
    lifetime_ticks: u32,
    spawned: u64,
}

impl SpawnSystem {
    #[must_use]
    pub fn new(world: &mut World, config: &DemoConfig) -> Self {
        let archetype = ArchetypeBuilder::new()
            .add::<Position>()
            .add::<Velocity>()
            .add::<Lifetime>()
            .build(world);
        Self {
            archetype,
            velocity: world.mapper(),
            lifetime: world.mapper(),
            per_tick: config.spawn_per_tick,
            lifetime_ticks: config.lifetime_ticks,
            spawned: 0,
        }
    }
}

impl System for SpawnSystem {
    fn name(&self) -> &str {
        "spawn"
    }

    fn process(&mut self, world: &mut World) {
        for _ in 0..self.per_tick {
            let entity = match world.create_from(&self.archetype) {
                Ok(entity) => entity,
                Err(err) => {
                    warn!(error = %err, "spawn failed");
                    return;
                }
            };
            let n = self.spawned;
            self.spawned += 1;

            if let Some(velocity) = self.velocity.get_mut(world, entity) {
                velocity.dx = (n % 7) as f64 - 3.0;
                velocity.dy = 1.0;
            }
            if let Some(lifetime) = self.lifetime.get_mut(world, entity) {
                lifetime.remaining = self.lifetime_ticks;
            }
        }
    }
}

/// Integrates positions of every entity with a velocity.
pub struct Movement {
    position: ComponentMapper<Position>,
    velocity: ComponentMapper<Velocity>,
    step: f64,
}

impl Movement {
    #[must_use]
    pub fn new(world: &mut World, config: &DemoConfig) -> Self {
        Self {
            position: world.mapper(),
            velocity: world.mapper(),
            step: config.step,
        }
    }
}

impl EntityProcessor for Movement {
    fn name(&self) -> &str {
        "movement"
    }

    fn aspect(&self) -> AspectBuilder {
        AspectBuilder::new().all::<Position>().all::<Velocity>()
    }

    fn process(&mut self, world: &mut World, entity: Entity) {
        let Some(&velocity) = self.velocity.get(world, entity) else {
            return;
        };
        if let Some(position) = self.position.get_mut(world, entity) {
            position.x += velocity.dx * self.step;
            position.y += velocity.dy * self.step;
        }
    }
}

/// Counts lifetimes down and deletes entities whose lifetime ran out.
pub struct Expiry {
    lifetime: ComponentMapper<Lifetime>,
}

impl Expiry {
    #[must_use]
    pub fn new(world: &mut World) -> Self {
        Self {
            lifetime: world.mapper(),
        }
    }
}

struct ExpiryLog {
    position: ComponentMapper<Position>,
}

impl SubscriptionListener for ExpiryLog {
    fn removed(&mut self, world: &mut World, entities: &[Entity]) {
        for &entity in entities {
            if let Some(position) = self.position.get(world, entity) {
                debug!(%entity, x = position.x, y = position.y, "entity expired");
            }
        }
    }
}

impl EntityProcessor for Expiry {
    fn name(&self) -> &str {
        "expiry"
    }

    fn aspect(&self) -> AspectBuilder {
        AspectBuilder::new().all::<Lifetime>()
    }

    fn initialize(&mut self, world: &mut World, mortal: SubscriptionId) {
        let position = world.mapper::<Position>();
        if let Some(mortal) = world.subscription_mut(mortal) {
            mortal.add_listener_with(Box::new(ExpiryLog { position }), ListenerInterest::REMOVED);
        }
    }

    fn process(&mut self, world: &mut World, entity: Entity) {
        let expired = match self.lifetime.get_mut(world, entity) {
            Some(lifetime) => {
                lifetime.remaining = lifetime.remaining.saturating_sub(1);
                lifetime.remaining == 0
            }
            None => false,
        };
        if expired && let Err(err) = world.delete(entity) {
            warn!(%entity, error = %err, "failed to expire entity");
        }
    }
}

/// Register the demonstration systems on `world`, returning the activity
/// totals they will update.
pub fn install(world: &mut World, config: &DemoConfig) -> Rc<Cell<Activity>> {
    let activity = Rc::new(Cell::new(Activity::default()));
    if let Some(universal) = world.subscription_mut(SubscriptionId(0)) {
        universal.add_listener(Box::new(ActivityLogger {
            activity: Rc::clone(&activity),
        }));
    }

    let spawn = SpawnSystem::new(world, config);
    let movement = Movement::new(world, config);
    let expiry = Expiry::new(world);
    world.add_system(spawn);
    world.add_system(IteratingSystem::new(movement));
    world.add_system(IteratingSystem::new(expiry));
    activity
}
