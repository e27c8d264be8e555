//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a dense `u32` index with no inherent data. Every
//! per-entity array in the world is indexed by it, and ids are recycled once
//! the world has fully reclaimed a deleted entity.

use serde::{Deserialize, Serialize};

use crate::bits::BitVector;

/// A dense, reusable entity identifier.
///
/// Entities are pure identifiers; they carry no data of their own. Components
/// are attached to entities to give them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u32);

impl Entity {
    /// Create an entity from a raw index.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the identifier as an array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates entity ids, recycling reclaimed ones before growing.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    next_id: u32,
    recycled: Vec<Entity>,
    alive: BitVector,
}

impl EntityAllocator {
    /// Creates a new allocator. Ids start at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator whose live-set is sized for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: 0,
            recycled: Vec::new(),
            alive: BitVector::with_capacity(capacity),
        }
    }

    /// Allocates an entity id, preferring the most recently freed one.
    pub fn allocate(&mut self) -> Entity {
        let entity = match self.recycled.pop() {
            Some(entity) => entity,
            None => {
                let entity = Entity(self.next_id);
                self.next_id += 1;
                entity
            }
        };
        self.alive.set(entity.index());
        entity
    }

    /// Returns `true` if `entity` is currently allocated.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index())
    }

    /// Returns reclaimed entities to the free list. Ids that are not
    /// currently allocated are ignored.
    pub fn free(&mut self, entities: &[Entity]) {
        for &entity in entities {
            if self.is_alive(entity) {
                self.alive.unset(entity.index());
                self.recycled.push(entity);
            }
        }
    }

    /// Number of currently allocated entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.alive.cardinality()
    }

    /// Highest id ever handed out, plus one.
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.next_id as usize
    }

    /// Iterate allocated entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive.ones().map(|index| Entity(index as u32))
    }
}
