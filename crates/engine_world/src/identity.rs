//! Interning of composition bit sets into small integer identities.
//!
//! Entities store only a [`CompositionId`]; the bit set and the component
//! types it names live here, once per distinct composition. Identity 0 is the
//! empty composition. Identities are never freed.

use std::collections::HashMap;
use std::fmt;

use engine_component::{BitVector, ComponentType, ComponentTypeRegistry};

/// Interned identity of one composition bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CompositionId(pub u32);

impl CompositionId {
    /// The identity of the empty composition.
    pub const EMPTY: CompositionId = CompositionId(0);

    /// Returns the identity as an array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CompositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Composition({})", self.0)
    }
}

/// One interned composition.
#[derive(Debug, Clone)]
pub struct Composition {
    bits: BitVector,
    types: Vec<ComponentType>,
}

impl Composition {
    /// Bit set of owned component types.
    #[must_use]
    pub fn bits(&self) -> &BitVector {
        &self.bits
    }

    /// Owned component types in index order.
    #[must_use]
    pub fn types(&self) -> &[ComponentType] {
        &self.types
    }
}

/// Result of [`CompositionIdentityResolver::intern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interned {
    /// Identity of the bit set.
    pub id: CompositionId,
    /// `true` if the bit set had not been seen before.
    pub fresh: bool,
}

/// Interns composition bit sets.
#[derive(Debug)]
pub struct CompositionIdentityResolver {
    compositions: Vec<Composition>,
    lookup: HashMap<BitVector, CompositionId>,
}

// Never empty: the empty composition is interned at construction.
#[allow(clippy::len_without_is_empty)]
impl CompositionIdentityResolver {
    /// Create a resolver holding only the empty composition.
    #[must_use]
    pub fn new() -> Self {
        let empty = BitVector::new();
        let mut lookup = HashMap::new();
        lookup.insert(empty.clone(), CompositionId::EMPTY);
        Self {
            compositions: vec![Composition {
                bits: empty,
                types: Vec::new(),
            }],
            lookup,
        }
    }

    /// Identity of `bits`, if it has been interned.
    #[must_use]
    pub fn get(&self, bits: &BitVector) -> Option<CompositionId> {
        self.lookup.get(bits).copied()
    }

    /// Identity of `bits`, assigning the next one on first sight.
    ///
    /// The registry supplies the component types recorded alongside a fresh
    /// composition.
    pub fn intern(&mut self, bits: &BitVector, registry: &ComponentTypeRegistry) -> Interned {
        if let Some(id) = self.get(bits) {
            return Interned { id, fresh: false };
        }

        let id = CompositionId(self.compositions.len() as u32);
        let types = bits.ones().filter_map(|index| registry.get(index)).collect();
        self.compositions.push(Composition {
            bits: bits.clone(),
            types,
        });
        self.lookup.insert(bits.clone(), id);
        Interned { id, fresh: true }
    }

    /// The composition interned as `id`.
    #[must_use]
    pub fn composition(&self, id: CompositionId) -> Option<&Composition> {
        self.compositions.get(id.index())
    }

    /// Number of interned compositions, the empty one included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compositions.len()
    }

    /// Iterate compositions in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (CompositionId, &Composition)> {
        self.compositions
            .iter()
            .enumerate()
            .map(|(index, composition)| (CompositionId(index as u32), composition))
    }
}

impl Default for CompositionIdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}
