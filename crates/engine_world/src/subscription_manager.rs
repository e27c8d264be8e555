//! Registry of every subscription in a world.

use std::collections::HashMap;

use engine_component::{AspectBuilder, BitVector, Entity};

use crate::identity::CompositionId;
use crate::subscription::{EntitySubscription, SubscriptionDelta, SubscriptionId};

/// Owns all subscriptions, memoised by aspect builder.
///
/// Subscription 0 is the universal one, created with the world. It reports
/// every deleted entity as removed, whether or not it had already matched.
#[derive(Debug, Default)]
pub struct AspectSubscriptionManager {
    subscriptions: Vec<EntitySubscription>,
    by_builder: HashMap<AspectBuilder, SubscriptionId>,
}

impl AspectSubscriptionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The subscription previously created for an equal builder.
    #[must_use]
    pub fn find(&self, builder: &AspectBuilder) -> Option<SubscriptionId> {
        self.by_builder.get(builder).copied()
    }

    /// Take ownership of a synchronised subscription.
    pub(crate) fn insert(&mut self, subscription: EntitySubscription) -> SubscriptionId {
        let id = SubscriptionId(self.subscriptions.len());
        self.by_builder
            .insert(subscription.aspect_builder().clone(), id);
        self.subscriptions.push(subscription);
        id
    }

    /// The subscription behind `id`.
    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<&EntitySubscription> {
        self.subscriptions.get(id.0)
    }

    /// Mutable access to the subscription behind `id`.
    pub fn get_mut(&mut self, id: SubscriptionId) -> Option<&mut EntitySubscription> {
        self.subscriptions.get_mut(id.0)
    }

    /// Number of subscriptions, the universal one included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if no subscription exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Iterate subscriptions in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (SubscriptionId, &EntitySubscription)> {
        self.subscriptions
            .iter()
            .enumerate()
            .map(|(index, subscription)| (SubscriptionId(index), subscription))
    }

    /// Broadcast a newly interned composition to every subscription.
    pub(crate) fn process_component_identity(&mut self, id: CompositionId, bits: &BitVector) {
        for subscription in &mut self.subscriptions {
            subscription.process_component_identity(id, bits);
        }
    }

    /// Apply one round's batch to a single subscription and drain its delta.
    pub(crate) fn reconcile(
        &mut self,
        id: SubscriptionId,
        changed: &[(Entity, CompositionId)],
        deleted: &[Entity],
    ) -> Option<SubscriptionDelta> {
        let subscription = self.subscriptions.get_mut(id.0)?;
        if id.0 == 0 {
            subscription.process_all(changed, deleted);
        } else {
            subscription.process(changed, deleted);
        }
        subscription.take_delta()
    }
}
