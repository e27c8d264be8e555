//! # engine_component
//!
//! The "C" in ECS: what a component is, how its instances are stored, and how
//! compositions of components are described and matched.
//!
//! This crate provides:
//!
//! - [`BitVector`]: growable bit set with value equality, used for compositions.
//! - [`Entity`] and [`EntityAllocator`]: dense, recycled entity identifiers.
//! - [`Component`]: the contract all component data must satisfy.
//! - [`ComponentTypeRegistry`]: assigns each component type a stable bit index.
//! - [`ComponentStore`]: per-type dense storage with immediate or delayed removal.
//! - [`ComponentPool`]: reset-on-free recycling for pooled component types.
//! - [`Aspect`] and [`AspectBuilder`]: predicates over compositions.
//!
//! Nothing here knows about worlds or subscriptions; see `engine_world`.

pub mod bits;
pub mod component;
pub mod entity;
pub mod error;
pub mod pool;
pub mod query;
pub mod store;

pub use bits::BitVector;
pub use component::{Component, ComponentKey, ComponentType, ComponentTypeRegistry};
pub use entity::{Entity, EntityAllocator};
pub use error::{BoxError, ComponentError};
pub use pool::ComponentPool;
pub use query::{Aspect, AspectBuilder};
pub use store::{ComponentStore, ErasedStore, SlotState};
