//! Core [`Component`] trait and the per-world component type registry.
//!
//! Every component type is assigned a dense, 0-based bit index the first time
//! a world sees it. That index addresses the type's store and its bit in every
//! composition. Indices are never reused within a registry.
//!
//! ## Pooling and delayed removal
//!
//! A type opts into pooling with [`Component::POOLED`]: removed instances are
//! [`reset`](Component::reset) and kept for the next creation instead of being
//! dropped. [`Component::DELAYED_REMOVAL`] keeps a removed instance readable
//! until the end of the convergence round, so subscription listeners can
//! inspect it one last time. A registry created with
//! [`ComponentTypeRegistry::with_delayed_removal`] forces delayed removal on
//! every type it registers.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::BoxError;
use crate::store::{ComponentStore, ErasedStore};

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use engine_component::{BoxError, Component};
///
/// #[derive(Debug, Default)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
///     fn instantiate() -> Result<Self, BoxError> { Ok(Self::default()) }
/// }
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    /// Recycle removed instances through a pool instead of dropping them.
    const POOLED: bool = false;

    /// Keep removed instances readable until the end of the round.
    const DELAYED_REMOVAL: bool = false;

    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Construct a fresh instance.
    fn instantiate() -> Result<Self, BoxError>;

    /// Restore a pooled instance to its freshly constructed state before reuse.
    fn reset(&mut self) {}
}

/// Registration record for one component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    /// Dense bit index; also the index of the type's store.
    pub index: usize,
    /// Human-readable name.
    pub name: &'static str,
    /// Rust type identity.
    pub type_id: TypeId,
    /// Whether removed instances are pooled.
    pub pooled: bool,
    /// Whether removal is deferred to the end of the round.
    pub delayed_removal: bool,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A world-independent reference to a component type.
///
/// Keys are what aspect and archetype builders collect: they compare by type
/// identity alone and carry enough information to register the type lazily
/// in whichever registry later builds them.
#[derive(Clone, Copy)]
pub struct ComponentKey {
    type_id: TypeId,
    name: &'static str,
    register: fn(&mut ComponentTypeRegistry) -> ComponentType,
}

impl ComponentKey {
    /// Key for component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::type_name(),
            register: ComponentTypeRegistry::register::<T>,
        }
    }

    /// Human-readable name of the keyed type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register the keyed type in `registry`, or look it up if already known.
    pub fn register(&self, registry: &mut ComponentTypeRegistry) -> ComponentType {
        (self.register)(registry)
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentKey {}

impl Hash for ComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ComponentKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type StoreFactory = fn(ComponentType, usize) -> Box<dyn ErasedStore>;

fn make_store<T: Component>(component_type: ComponentType, capacity: usize) -> Box<dyn ErasedStore> {
    Box::new(ComponentStore::<T>::new(component_type, capacity))
}

/// Assigns bit indices to component types and remembers how to build their
/// stores.
#[derive(Debug, Default)]
pub struct ComponentTypeRegistry {
    by_type: HashMap<TypeId, usize>,
    types: Vec<ComponentType>,
    factories: Vec<StoreFactory>,
    always_delay_removal: bool,
}

impl ComponentTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that uses delayed removal for every type.
    #[must_use]
    pub fn with_delayed_removal(always_delay_removal: bool) -> Self {
        Self {
            always_delay_removal,
            ..Self::default()
        }
    }

    /// Register `T`, returning its existing record if it was seen before.
    pub fn register<T: Component>(&mut self) -> ComponentType {
        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.type_of_id(type_id) {
            return existing;
        }

        let component_type = ComponentType {
            index: self.types.len(),
            name: T::type_name(),
            type_id,
            pooled: T::POOLED,
            delayed_removal: T::DELAYED_REMOVAL || self.always_delay_removal,
        };
        self.by_type.insert(type_id, component_type.index);
        self.types.push(component_type);
        self.factories.push(make_store::<T>);
        component_type
    }

    /// Look up `T` without registering it.
    #[must_use]
    pub fn type_of<T: Component>(&self) -> Option<ComponentType> {
        self.type_of_id(TypeId::of::<T>())
    }

    fn type_of_id(&self, type_id: TypeId) -> Option<ComponentType> {
        self.by_type
            .get(&type_id)
            .and_then(|&index| self.types.get(index))
            .copied()
    }

    /// The type registered at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ComponentType> {
        self.types.get(index).copied()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate registered types in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentType> {
        self.types.iter()
    }

    /// Build an empty store for the type at `index`.
    #[must_use]
    pub fn make_store(&self, index: usize, capacity: usize) -> Option<Box<dyn ErasedStore>> {
        let component_type = self.types.get(index)?;
        let factory = self.factories.get(index)?;
        Some(factory(*component_type, capacity))
    }
}
