//! Precompiled composition changes.
//!
//! An [`EntityTransmuter`] applies a fixed set of component additions and
//! removals. The same delta lands on different compositions depending on
//! where an entity starts, so the transmuter caches one
//! [`TransmuteOperation`] per origin composition identity. The first
//! transmute from a given origin derives the operation; later ones reuse it.

use std::collections::BTreeSet;
use std::fmt;

use engine_component::{AspectBuilder, BitVector, Component, ComponentKey, ComponentType, Entity};

use crate::error::WorldError;
use crate::identity::CompositionId;
use crate::world::World;

/// The concrete store work needed to move an entity from one composition to
/// another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmuteOperation {
    pub(crate) composition: CompositionId,
    pub(crate) additions: Vec<ComponentType>,
    pub(crate) removals: Vec<ComponentType>,
}

impl TransmuteOperation {
    /// Identity of the resulting composition.
    #[must_use]
    pub fn composition(&self) -> CompositionId {
        self.composition
    }

    /// Types created by this operation.
    #[must_use]
    pub fn additions(&self) -> &[ComponentType] {
        &self.additions
    }

    /// Types removed by this operation.
    #[must_use]
    pub fn removals(&self) -> &[ComponentType] {
        &self.removals
    }

    /// Create and remove components in the stores. Does not touch the
    /// entity's composition identity.
    ///
    /// If a component cannot be constructed, the additions made so far are
    /// removed again and the stores are left as they were.
    pub(crate) fn perform(&self, world: &mut World, entity: Entity) -> Result<(), WorldError> {
        for (created, component_type) in self.additions.iter().enumerate() {
            if let Some(store) = world.components.erased_mut(component_type.index)
                && let Err(err) = store.internal_create(entity)
            {
                remove_components(world, entity, &self.additions[..created]);
                return Err(err.into());
            }
        }
        remove_components(world, entity, &self.removals);
        Ok(())
    }
}

fn remove_components(world: &mut World, entity: Entity, types: &[ComponentType]) {
    for component_type in types {
        if let Some(store) = world.components.erased_mut(component_type.index)
            && store.internal_remove(entity)
        {
            world.batch.schedule_purge(component_type.index);
        }
    }
}

impl fmt::Display for TransmuteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |types: &[ComponentType]| {
            types
                .iter()
                .map(|component_type| component_type.name)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "TransmuteOperation(add={{{}}} remove={{{}}})",
            names(&self.additions),
            names(&self.removals)
        )
    }
}

/// Applies a fixed add/remove delta to entities.
#[derive(Debug, Default)]
pub struct EntityTransmuter {
    additions: BitVector,
    removals: BitVector,
    operations: Vec<Option<TransmuteOperation>>,
}

impl EntityTransmuter {
    pub(crate) fn from_bits(additions: BitVector, removals: BitVector) -> Self {
        Self {
            additions,
            removals,
            operations: Vec::new(),
        }
    }

    /// Transmuter adding an aspect's `all` types and removing its `exclude`
    /// types, so that transmuted entities satisfy those two constraints.
    pub fn from_aspect(world: &mut World, builder: &AspectBuilder) -> Self {
        let aspect = builder.build(world.components.registry_mut());
        world.sync_component_types();
        Self::from_bits(aspect.all_set().clone(), aspect.exclusion_set().clone())
    }

    /// Apply the delta to `entity`: update the stores, then its composition
    /// identity, and flag it for the next round.
    pub fn transmute(&mut self, world: &mut World, entity: Entity) -> Result<(), WorldError> {
        world.ensure_active(entity, "transmute")?;
        world.batch.mark_changed(entity);

        let origin = world.components.identity(entity);
        let operation = self.operation(world, origin);
        operation.perform(world, entity)?;
        world.components.set_identity(entity, operation.composition);
        Ok(())
    }

    /// Update only the composition identity; the stores were already
    /// changed by the caller.
    pub(crate) fn transmute_no_op(&mut self, world: &mut World, entity: Entity) {
        world.batch.mark_changed(entity);
        let origin = world.components.identity(entity);
        let composition = self.operation(world, origin).composition;
        world.components.set_identity(entity, composition);
    }

    /// The cached operation for entities starting at `origin`, if derived yet.
    #[must_use]
    pub fn cached_operation(&self, origin: CompositionId) -> Option<&TransmuteOperation> {
        self.operations.get(origin.index()).and_then(Option::as_ref)
    }

    /// Number of origins with a cached operation.
    #[must_use]
    pub fn cached_operations(&self) -> usize {
        self.operations.iter().flatten().count()
    }

    fn operation(&mut self, world: &mut World, origin: CompositionId) -> &TransmuteOperation {
        let index = origin.index();
        if index >= self.operations.len() {
            self.operations.resize_with(index + 1, || None);
        }
        let (additions, removals) = (&self.additions, &self.removals);
        self.operations[index]
            .get_or_insert_with(|| derive_operation(additions, removals, world, origin))
    }
}

fn derive_operation(
    additions: &BitVector,
    removals: &BitVector,
    world: &mut World,
    origin: CompositionId,
) -> TransmuteOperation {
    let origin_bits = world
        .components
        .identities()
        .composition(origin)
        .map(|composition| composition.bits().clone())
        .unwrap_or_default();

    let mut target = origin_bits.clone();
    target.or(additions);
    target.and_not(removals);
    let composition = world.composition_identity(&target);

    let registry = world.components.registry();
    let additions = additions
        .ones()
        .filter(|&index| !origin_bits.get(index))
        .filter_map(|index| registry.get(index))
        .collect();
    let removals = removals
        .ones()
        .filter(|&index| origin_bits.get(index))
        .filter_map(|index| registry.get(index))
        .collect();

    TransmuteOperation {
        composition,
        additions,
        removals,
    }
}

/// Collects the delta of an [`EntityTransmuter`].
///
/// Adding a type cancels an earlier removal of it and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmuterBuilder {
    additions: BTreeSet<ComponentKey>,
    removals: BTreeSet<ComponentKey>,
}

impl TransmuterBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add component `T`.
    #[must_use]
    pub fn add<T: Component>(mut self) -> Self {
        let key = ComponentKey::of::<T>();
        self.removals.remove(&key);
        self.additions.insert(key);
        self
    }

    /// Remove component `T`.
    #[must_use]
    pub fn remove<T: Component>(mut self) -> Self {
        let key = ComponentKey::of::<T>();
        self.additions.remove(&key);
        self.removals.insert(key);
        self
    }

    /// Resolve the delta against `world`.
    pub fn build(&self, world: &mut World) -> EntityTransmuter {
        let registry = world.components.registry_mut();
        let additions = self
            .additions
            .iter()
            .map(|key| key.register(registry).index)
            .collect();
        let removals = self
            .removals
            .iter()
            .map(|key| key.register(registry).index)
            .collect();
        world.sync_component_types();
        EntityTransmuter::from_bits(additions, removals)
    }
}

#[cfg(test)]
mod tests {
    use engine_component::BoxError;

    use super::*;

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
    marker!(Z);

    #[derive(Debug)]
    struct Broken;
    impl Component for Broken {
        fn type_name() -> &'static str {
            "Broken"
        }
        fn instantiate() -> Result<Self, BoxError> {
            Err("no constructor".into())
        }
    }

    #[test]
    fn test_failed_transmute_leaves_entity_unchanged() {
        let mut world = World::new();
        world.component_type::<X>();
        let e = world.create();
        world.create_component::<Z>(e).unwrap();
        let origin = world.composition_id(e);

        let mut transmuter = TransmuterBuilder::new().add::<X>().add::<Broken>().build(&mut world);
        let err = transmuter.transmute(&mut world, e).unwrap_err();
        assert!(err.to_string().contains("no constructor"));

        assert!(!world.has::<X>(e));
        assert_eq!(world.get::<X>(e), None);
        assert!(world.has::<Z>(e));
        assert_eq!(world.composition_id(e), origin);

        world.delete(e).unwrap();
        world.process();
        let reused = world.create();
        assert_eq!(reused, e);
        assert!(!world.has::<X>(reused));
        assert_eq!(world.get::<X>(reused), None);
        assert!(world.component_types_of(reused).is_empty());
    }

    #[test]
    fn test_transmute_swaps_components() {
        let mut world = World::new();
        let e = world.create();
        world.create_component::<X>(e).unwrap();

        let mut transmuter = TransmuterBuilder::new().add::<Y>().remove::<X>().build(&mut world);
        transmuter.transmute(&mut world, e).unwrap();

        assert!(world.has::<Y>(e));
        assert!(!world.has::<X>(e));
        let y = world.component_type::<Y>();
        assert_eq!(world.component_types_of(e), &[y]);
    }

    #[test]
    fn test_operations_are_cached_per_origin() {
        let mut world = World::new();
        let a = world.create();
        world.create_component::<X>(a).unwrap();
        let b = world.create();
        world.create_component::<X>(b).unwrap();
        world.create_component::<Z>(b).unwrap();
        let c = world.create();
        world.create_component::<X>(c).unwrap();

        let mut transmuter = TransmuterBuilder::new().add::<Y>().remove::<X>().build(&mut world);
        let origin_x = world.composition_id(a);
        let origin_xz = world.composition_id(b);

        transmuter.transmute(&mut world, a).unwrap();
        assert_eq!(transmuter.cached_operations(), 1);

        transmuter.transmute(&mut world, b).unwrap();
        assert_eq!(transmuter.cached_operations(), 2);

        transmuter.transmute(&mut world, c).unwrap();
        assert_eq!(transmuter.cached_operations(), 2);

        let (x, y, z) = (
            world.component_type::<X>(),
            world.component_type::<Y>(),
            world.component_type::<Z>(),
        );
        assert_eq!(world.component_types_of(a), &[y]);
        assert_eq!(world.component_types_of(b), &[z, y]);
        assert_eq!(world.composition_id(a), world.composition_id(c));

        let from_x = transmuter.cached_operation(origin_x).unwrap();
        assert_eq!(from_x.additions(), &[y]);
        assert_eq!(from_x.removals(), &[x]);
        assert_ne!(transmuter.cached_operation(origin_xz).unwrap().composition(), from_x.composition());
    }

    #[test]
    fn test_builder_last_call_wins() {
        let builder = TransmuterBuilder::new().add::<X>().remove::<X>();
        assert_eq!(builder, TransmuterBuilder::new().remove::<X>());
    }

    #[test]
    fn test_transmute_inactive_entity_fails() {
        let mut world = World::new();
        let e = world.create();
        world.delete(e).unwrap();
        let mut transmuter = TransmuterBuilder::new().add::<X>().build(&mut world);
        assert!(matches!(
            transmuter.transmute(&mut world, e),
            Err(WorldError::InactiveEntity { operation: "transmute", .. })
        ));
    }

    #[test]
    fn test_from_aspect_satisfies_all_and_exclude() {
        let mut world = World::new();
        let e = world.create();
        world.create_component::<Z>(e).unwrap();

        let builder = AspectBuilder::new().all::<X>().exclude::<Z>();
        let mut transmuter = EntityTransmuter::from_aspect(&mut world, &builder);
        transmuter.transmute(&mut world, e).unwrap();

        assert!(world.has::<X>(e));
        assert!(!world.has::<Z>(e));
    }

    #[test]
    fn test_operation_display() {
        let mut world = World::new();
        let e = world.create();
        world.create_component::<X>(e).unwrap();
        let origin = world.composition_id(e);
        let mut transmuter = TransmuterBuilder::new().add::<Y>().remove::<X>().build(&mut world);
        transmuter.transmute(&mut world, e).unwrap();
        assert_eq!(
            transmuter.cached_operation(origin).unwrap().to_string(),
            "TransmuteOperation(add={Y} remove={X})"
        );
    }
}
