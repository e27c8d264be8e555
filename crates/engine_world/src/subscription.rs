//! Live, incrementally maintained result set of one aspect.
//!
//! An [`EntitySubscription`] never evaluates its aspect per entity. Instead it
//! evaluates it once per composition identity, when the identity is interned,
//! and caches the answer. Reconciling an entity is then a bit lookup keyed by
//! the entity's current identity.
//!
//! Membership changes accumulate in the `inserted` and `removed` sets during a
//! round and are delivered to listeners once per round: removals first, then
//! insertions, each only when non-empty.

use std::fmt;

use engine_component::{Aspect, AspectBuilder, BitVector, Entity};

use crate::identity::CompositionId;
use crate::world::World;

/// Handle to a subscription owned by a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub usize);

/// Handle to a listener registered on one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Which callbacks a listener wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerInterest {
    /// Deliver [`SubscriptionListener::inserted`].
    pub inserted: bool,
    /// Deliver [`SubscriptionListener::removed`].
    pub removed: bool,
}

impl ListenerInterest {
    /// Both callbacks.
    pub const ALL: Self = Self {
        inserted: true,
        removed: true,
    };
    /// Insertions only.
    pub const INSERTED: Self = Self {
        inserted: true,
        removed: false,
    };
    /// Removals only.
    pub const REMOVED: Self = Self {
        inserted: false,
        removed: true,
    };
}

impl Default for ListenerInterest {
    fn default() -> Self {
        Self::ALL
    }
}

/// Receives membership changes of a subscription.
///
/// Callbacks get the world mutably and may edit, create or delete entities.
/// Those changes are picked up by the next convergence round.
pub trait SubscriptionListener {
    /// Entities that started matching this round.
    fn inserted(&mut self, _world: &mut World, _entities: &[Entity]) {}

    /// Entities that stopped matching, or were deleted, this round.
    fn removed(&mut self, _world: &mut World, _entities: &[Entity]) {}
}

pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) interest: ListenerInterest,
    pub(crate) listener: Box<dyn SubscriptionListener>,
}

/// Membership changes accumulated over one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    /// Entities that left the subscription.
    pub removed: Vec<Entity>,
    /// Entities that joined the subscription.
    pub inserted: Vec<Entity>,
}

/// The entities matching one aspect, kept current round by round.
pub struct EntitySubscription {
    aspect: Aspect,
    builder: AspectBuilder,
    active: BitVector,
    entities: Vec<Entity>,
    aspect_cache: BitVector,
    inserted: BitVector,
    removed: BitVector,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
    dispatching: bool,
    detached: Vec<ListenerId>,
}

impl EntitySubscription {
    pub(crate) fn new(aspect: Aspect, builder: AspectBuilder, capacity: usize) -> Self {
        Self {
            aspect,
            builder,
            active: BitVector::with_capacity(capacity),
            entities: Vec::new(),
            aspect_cache: BitVector::new(),
            inserted: BitVector::with_capacity(capacity),
            removed: BitVector::with_capacity(capacity),
            listeners: Vec::new(),
            next_listener: 0,
            dispatching: false,
            detached: Vec::new(),
        }
    }

    /// The aspect this subscription matches.
    #[must_use]
    pub fn aspect(&self) -> &Aspect {
        &self.aspect
    }

    /// The builder the aspect was resolved from.
    #[must_use]
    pub fn aspect_builder(&self) -> &AspectBuilder {
        &self.builder
    }

    /// Members in ascending id order, as of the last completed round.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Members as a bit set indexed by entity id.
    #[must_use]
    pub fn active_entity_ids(&self) -> &BitVector {
        &self.active
    }

    /// Returns `true` if `entity` is a member.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.active.get(entity.index())
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if nothing matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Register a listener for both callbacks.
    pub fn add_listener(&mut self, listener: Box<dyn SubscriptionListener>) -> ListenerId {
        self.add_listener_with(listener, ListenerInterest::ALL)
    }

    /// Register a listener for the callbacks selected by `interest`.
    pub fn add_listener_with(
        &mut self,
        listener: Box<dyn SubscriptionListener>,
        interest: ListenerInterest,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(ListenerEntry {
            id,
            interest,
            listener,
        });
        id
    }

    /// Unregister a listener. Returns `false` if the id is unknown.
    ///
    /// A listener removed while callbacks are being delivered stops receiving
    /// them from the next subscription delta on.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        if let Some(position) = self.listeners.iter().position(|entry| entry.id == id) {
            self.listeners.remove(position);
            return true;
        }
        if self.dispatching && id.0 < self.next_listener {
            self.detached.push(id);
            return true;
        }
        false
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Cache whether a newly interned composition satisfies the aspect.
    pub(crate) fn process_component_identity(&mut self, id: CompositionId, bits: &BitVector) {
        if self.aspect.matches(bits) {
            self.aspect_cache.set(id.index());
        } else {
            self.aspect_cache.unset(id.index());
        }
    }

    /// Reconcile one entity against its current composition identity.
    pub(crate) fn check(&mut self, entity: Entity, id: CompositionId) {
        let matches = self.aspect_cache.get(id.index());
        let member = self.active.get(entity.index());
        if matches && !member {
            self.insert(entity);
        } else if !matches && member {
            self.remove(entity);
        }
    }

    /// Apply one round: evict deleted members, then reconcile changed entities.
    pub(crate) fn process(&mut self, changed: &[(Entity, CompositionId)], deleted: &[Entity]) {
        for &entity in deleted {
            if self.active.get(entity.index()) {
                self.remove(entity);
            }
        }
        self.check_all(changed);
    }

    /// Like [`process`](Self::process), but reports every deleted entity as
    /// removed, member or not.
    pub(crate) fn process_all(&mut self, changed: &[(Entity, CompositionId)], deleted: &[Entity]) {
        for &entity in deleted {
            self.remove(entity);
        }
        self.check_all(changed);
    }

    fn check_all(&mut self, changed: &[(Entity, CompositionId)]) {
        for &(entity, id) in changed {
            self.check(entity, id);
        }
    }

    fn insert(&mut self, entity: Entity) {
        self.active.set(entity.index());
        self.inserted.set(entity.index());
    }

    fn remove(&mut self, entity: Entity) {
        self.active.unset(entity.index());
        self.removed.set(entity.index());
    }

    /// Drain this round's changes, refreshing the member list if any occurred.
    pub(crate) fn take_delta(&mut self) -> Option<SubscriptionDelta> {
        if self.inserted.is_empty() && self.removed.is_empty() {
            return None;
        }
        let delta = SubscriptionDelta {
            removed: drain_entities(&mut self.removed),
            inserted: drain_entities(&mut self.inserted),
        };
        self.rebuild_entities();
        Some(delta)
    }

    /// Drop accumulated changes without delivering them.
    pub(crate) fn settle(&mut self) {
        self.inserted.clear();
        self.removed.clear();
        self.rebuild_entities();
    }

    fn rebuild_entities(&mut self) {
        self.entities.clear();
        self.entities
            .extend(self.active.ones().map(|index| Entity(index as u32)));
    }

    pub(crate) fn take_listeners(&mut self) -> Vec<ListenerEntry> {
        self.dispatching = true;
        std::mem::take(&mut self.listeners)
    }

    /// Put back listeners taken for dispatch. Listeners registered during
    /// dispatch keep their place after them.
    pub(crate) fn restore_listeners(&mut self, mut taken: Vec<ListenerEntry>) {
        taken.append(&mut self.listeners);
        let detached = std::mem::take(&mut self.detached);
        taken.retain(|entry| !detached.contains(&entry.id));
        self.listeners = taken;
        self.dispatching = false;
    }
}

fn drain_entities(bits: &mut BitVector) -> Vec<Entity> {
    bits.drain()
        .into_iter()
        .map(|index| Entity(index as u32))
        .collect()
}

impl fmt::Debug for EntitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySubscription")
            .field("aspect", &self.builder.to_string())
            .field("entities", &self.entities.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl fmt::Display for EntitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntitySubscription[{}]", self.builder)
    }
}
