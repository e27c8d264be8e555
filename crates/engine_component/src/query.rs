//! Aspects: predicates over entity compositions.
//!
//! An [`Aspect`] is three bit sets evaluated against a composition:
//!
//! - `all`: every bit must be present,
//! - `exclude`: no bit may be present,
//! - `one`: at least one bit must be present, unless the set is empty.
//!
//! An aspect with all three sets empty matches every composition.
//!
//! Aspects are built from an [`AspectBuilder`], which names component types
//! without needing a registry. Builders compare structurally, so two builders
//! naming the same types in any order are interchangeable as lookup keys.

use std::collections::BTreeSet;
use std::fmt;

use crate::bits::BitVector;
use crate::component::{Component, ComponentKey, ComponentTypeRegistry};

/// An immutable require-all / exclude / require-one predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Aspect {
    all: BitVector,
    exclude: BitVector,
    one: BitVector,
}

impl Aspect {
    /// Create an aspect from raw bit sets.
    #[must_use]
    pub fn new(all: BitVector, exclude: BitVector, one: BitVector) -> Self {
        Self { all, exclude, one }
    }

    /// Bits that must all be present.
    #[must_use]
    pub fn all_set(&self) -> &BitVector {
        &self.all
    }

    /// Bits that must all be absent.
    #[must_use]
    pub fn exclusion_set(&self) -> &BitVector {
        &self.exclude
    }

    /// Bits of which at least one must be present.
    #[must_use]
    pub fn one_set(&self) -> &BitVector {
        &self.one
    }

    /// Returns `true` if a composition satisfies this aspect.
    #[must_use]
    pub fn matches(&self, composition: &BitVector) -> bool {
        if !self.all.is_empty() && self.all.ones().any(|bit| !composition.get(bit)) {
            return false;
        }

        if self.exclude.intersects(composition) {
            return false;
        }

        self.one.is_empty() || self.one.intersects(composition)
    }
}

/// Describes an [`Aspect`] by component type.
///
/// # Examples
///
/// ```rust
/// use engine_component::{AspectBuilder, BoxError, Component, ComponentTypeRegistry};
///
/// struct Position;
/// impl Component for Position {
///     fn type_name() -> &'static str { "Position" }
///     fn instantiate() -> Result<Self, BoxError> { Ok(Self) }
/// }
///
/// struct Frozen;
/// impl Component for Frozen {
///     fn type_name() -> &'static str { "Frozen" }
///     fn instantiate() -> Result<Self, BoxError> { Ok(Self) }
/// }
///
/// let builder = AspectBuilder::new().all::<Position>().exclude::<Frozen>();
/// let mut registry = ComponentTypeRegistry::new();
/// let aspect = builder.build(&mut registry);
/// assert_eq!(aspect.all_set().cardinality(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AspectBuilder {
    all: BTreeSet<ComponentKey>,
    exclude: BTreeSet<ComponentKey>,
    one: BTreeSet<ComponentKey>,
}

impl AspectBuilder {
    /// Create a builder that matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require component `T`.
    #[must_use]
    pub fn all<T: Component>(self) -> Self {
        self.all_key(ComponentKey::of::<T>())
    }

    /// Reject entities owning component `T`.
    #[must_use]
    pub fn exclude<T: Component>(self) -> Self {
        self.exclude_key(ComponentKey::of::<T>())
    }

    /// Require at least one of the `one` components, `T` among them.
    #[must_use]
    pub fn one<T: Component>(self) -> Self {
        self.one_key(ComponentKey::of::<T>())
    }

    /// Require the keyed component.
    #[must_use]
    pub fn all_key(mut self, key: ComponentKey) -> Self {
        self.all.insert(key);
        self
    }

    /// Reject entities owning the keyed component.
    #[must_use]
    pub fn exclude_key(mut self, key: ComponentKey) -> Self {
        self.exclude.insert(key);
        self
    }

    /// Add the keyed component to the `one` set.
    #[must_use]
    pub fn one_key(mut self, key: ComponentKey) -> Self {
        self.one.insert(key);
        self
    }

    /// Required component keys.
    pub fn all_keys(&self) -> impl Iterator<Item = &ComponentKey> {
        self.all.iter()
    }

    /// Excluded component keys.
    pub fn exclude_keys(&self) -> impl Iterator<Item = &ComponentKey> {
        self.exclude.iter()
    }

    /// Keys of the `one` set.
    pub fn one_keys(&self) -> impl Iterator<Item = &ComponentKey> {
        self.one.iter()
    }

    /// Resolve the named types against `registry`, registering unseen ones.
    pub fn build(&self, registry: &mut ComponentTypeRegistry) -> Aspect {
        let mut resolve = |keys: &BTreeSet<ComponentKey>| -> BitVector {
            keys.iter().map(|key| key.register(registry).index).collect()
        };
        let all = resolve(&self.all);
        let exclude = resolve(&self.exclude);
        let one = resolve(&self.one);
        Aspect::new(all, exclude, one)
    }
}

impl fmt::Display for AspectBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names(keys: &BTreeSet<ComponentKey>) -> String {
            let mut names: Vec<&str> = keys.iter().map(ComponentKey::name).collect();
            names.sort_unstable();
            names.join(", ")
        }
        write!(
            f,
            "Aspect[all=({}), one=({}), exclude=({})]",
            names(&self.all),
            names(&self.one),
            names(&self.exclude)
        )
    }
}
