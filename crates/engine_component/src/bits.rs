//! Growable bit vector used for compositions, aspects, and per-entity flags.
//!
//! [`BitVector`] wraps a [`FixedBitSet`] and grows on demand, so callers can
//! set any index without sizing the set up front. Equality and hashing only
//! consider set bits: two vectors holding the same bits compare equal even if
//! one of them has grown further than the other. This is what lets
//! compositions be interned by value.

use std::fmt;
use std::hash::{Hash, Hasher};

use fixedbitset::FixedBitSet;

/// A growable set of `usize` indices.
#[derive(Clone, Default)]
pub struct BitVector {
    bits: FixedBitSet,
}

impl BitVector {
    /// Create an empty bit vector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bits: FixedBitSet::new(),
        }
    }

    /// Create an empty bit vector able to hold `bits` indices without growing.
    #[must_use]
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(bits),
        }
    }

    /// Grow so that indices below `bits` can be set without reallocating.
    pub fn ensure_capacity(&mut self, bits: usize) {
        if bits > self.bits.len() {
            self.bits.grow(bits);
        }
    }

    /// Returns `true` if `index` is set. Out-of-range indices are unset.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.bits.contains(index)
    }

    /// Set `index`, growing the vector if needed.
    pub fn set(&mut self, index: usize) {
        self.ensure_capacity(index + 1);
        self.bits.insert(index);
    }

    /// Clear `index`. Clearing an out-of-range index does nothing.
    pub fn unset(&mut self, index: usize) {
        if index < self.bits.len() {
            self.bits.set(index, false);
        }
    }

    /// Clear every bit, keeping the allocation.
    pub fn clear(&mut self) {
        self.bits.clear();
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_clear()
    }

    /// Number of set bits.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Returns `true` if any bit is set in both vectors.
    #[must_use]
    pub fn intersects(&self, other: &BitVector) -> bool {
        !self.bits.is_disjoint(&other.bits)
    }

    /// Returns `true` if every bit of `other` is also set in `self`.
    #[must_use]
    pub fn contains_all(&self, other: &BitVector) -> bool {
        other.bits.is_subset(&self.bits)
    }

    /// In-place union.
    pub fn or(&mut self, other: &BitVector) {
        self.bits.union_with(&other.bits);
    }

    /// In-place difference: clears every bit that is set in `other`.
    pub fn and_not(&mut self, other: &BitVector) {
        self.bits.difference_with(&other.bits);
    }

    /// Iterate set indices in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }

    /// Collect set indices in ascending order and clear the vector.
    pub fn drain(&mut self) -> Vec<usize> {
        let indices: Vec<usize> = self.bits.ones().collect();
        self.bits.clear();
        indices
    }
}

impl PartialEq for BitVector {
    fn eq(&self, other: &Self) -> bool {
        self.ones().eq(other.ones())
    }
}

impl Eq for BitVector {}

impl Hash for BitVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut count = 0usize;
        for index in self.ones() {
            index.hash(state);
            count += 1;
        }
        count.hash(state);
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ones()).finish()
    }
}

impl FromIterator<usize> for BitVector {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bits = BitVector::new();
        for index in iter {
            bits.set(index);
        }
        bits
    }
}
