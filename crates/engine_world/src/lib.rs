//! # engine_world
//!
//! Entity bookkeeping on top of `engine_component`: which components every
//! entity owns, which entities every aspect matches, and how structural
//! changes are batched and converged.
//!
//! This crate provides:
//!
//! - [`World`]: the facade owning entities, stores, subscriptions and systems.
//! - [`CompositionIdentityResolver`]: interns composition bit sets into small ids.
//! - [`EntitySubscription`] and [`AspectSubscriptionManager`]: live aspect
//!   results with per-round listener deltas.
//! - [`BatchChangeProcessor`]: pending changes, deletions and purges.
//! - [`EntityTransmuter`] and [`Archetype`]: precompiled composition changes.
//! - [`ComponentMapper`] and [`EntityEdit`]: typed component access.
//! - [`System`] and [`IteratingSystem`]: per-tick work, optionally per entity.
//!
//! Nothing becomes visible to subscriptions until the world converges:
//!
//! ```
//! use engine_component::{AspectBuilder, BoxError, Component};
//! use engine_world::World;
//!
//! struct Tag;
//! impl Component for Tag {
//!     fn type_name() -> &'static str {
//!         "Tag"
//!     }
//!     fn instantiate() -> Result<Self, BoxError> {
//!         Ok(Tag)
//!     }
//! }
//!
//! let mut world = World::new();
//! let tagged = world.subscribe(&AspectBuilder::new().all::<Tag>());
//! let e = world.create();
//! world.create_component::<Tag>(e)?;
//! assert!(world.subscription(tagged).unwrap().is_empty());
//!
//! world.process();
//! assert_eq!(world.subscription(tagged).unwrap().entities(), &[e]);
//! # Ok::<(), engine_world::WorldError>(())
//! ```

pub mod archetype;
pub mod batch;
pub mod components;
pub mod config;
pub mod edit;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod subscription;
pub mod subscription_manager;
pub mod system;
pub mod transmuter;
pub mod world;

pub use archetype::{Archetype, ArchetypeBuilder};
pub use batch::{BatchChangeProcessor, RoundBatch};
pub use components::ComponentManager;
pub use config::WorldConfiguration;
pub use edit::EntityEdit;
pub use error::{AggregateError, WorldError};
pub use identity::{Composition, CompositionId, CompositionIdentityResolver, Interned};
pub use mapper::ComponentMapper;
pub use subscription::{
    EntitySubscription, ListenerId, ListenerInterest, SubscriptionDelta, SubscriptionId,
    SubscriptionListener,
};
pub use subscription_manager::AspectSubscriptionManager;
pub use system::{EntityProcessor, IteratingSystem, System};
pub use transmuter::{EntityTransmuter, TransmuteOperation, TransmuterBuilder};
pub use world::World;
