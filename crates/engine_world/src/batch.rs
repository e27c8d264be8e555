//! Deferred structural changes.
//!
//! Mutations only flip bits here. The world drains them at synchronisation
//! points, hands them to the subscriptions, purges delayed stores, and repeats
//! until a round produces nothing new.

use engine_component::{BitVector, Entity};

use crate::components::ComponentManager;
use crate::identity::CompositionId;

/// Changes drained for one convergence round.
#[derive(Debug, Default)]
pub struct RoundBatch {
    /// Entities whose composition may have changed, with their current identity.
    pub changed: Vec<(Entity, CompositionId)>,
    /// Entities deleted since the previous round.
    pub deleted: Vec<Entity>,
}

/// Pooled editor state: which entity the editor currently targets.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EditorSlot {
    entity: Entity,
}

/// Pending changes, deletions, delayed purges and the editor pool.
#[derive(Debug, Default)]
pub struct BatchChangeProcessor {
    changed: BitVector,
    deleted: BitVector,
    pending_purge: BitVector,
    purgatories: Vec<usize>,
    editors: Vec<EditorSlot>,
    editor_pool: Vec<EditorSlot>,
}

impl BatchChangeProcessor {
    /// Create an empty processor sized for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changed: BitVector::with_capacity(capacity),
            deleted: BitVector::with_capacity(capacity),
            pending_purge: BitVector::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Flag `entity` for reconciliation in the next round.
    pub fn mark_changed(&mut self, entity: Entity) {
        self.changed.set(entity.index());
    }

    /// Queue `entity` for deletion. A deleted entity is never reconciled
    /// against an aspect again.
    pub fn delete(&mut self, entity: Entity) {
        self.deleted.set(entity.index());
        self.pending_purge.set(entity.index());
        self.changed.unset(entity.index());
    }

    /// Returns `true` if `entity` is queued for deletion or awaiting reclaim.
    #[must_use]
    pub fn is_deleted(&self, entity: Entity) -> bool {
        self.pending_purge.get(entity.index())
    }

    /// Returns `true` while a convergence round has work to do.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.changed.is_empty() || !self.deleted.is_empty()
    }

    /// Drain changed and deleted entities for one round.
    pub fn drain(&mut self, components: &ComponentManager) -> RoundBatch {
        let changed = self
            .changed
            .drain()
            .into_iter()
            .map(|index| {
                let entity = Entity(index as u32);
                (entity, components.identity(entity))
            })
            .collect();
        let deleted = self
            .deleted
            .drain()
            .into_iter()
            .map(|index| Entity(index as u32))
            .collect();
        RoundBatch { changed, deleted }
    }

    /// Remember that the store at `index` has removals waiting for purge.
    pub fn schedule_purge(&mut self, index: usize) {
        self.purgatories.push(index);
    }

    /// Drain the stores waiting for purge.
    pub fn take_purgatories(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.purgatories)
    }

    pub(crate) fn purgatories_mut(&mut self) -> &mut Vec<usize> {
        &mut self.purgatories
    }

    /// Drain entities whose deletion has been fully observed and that are
    /// ready to be reclaimed.
    pub fn take_pending_purge(&mut self) -> Vec<Entity> {
        self.pending_purge
            .drain()
            .into_iter()
            .map(|index| Entity(index as u32))
            .collect()
    }

    /// Slot of the editor for `entity`, reusing the most recent one when it
    /// already targets the same entity.
    pub(crate) fn obtain_editor(&mut self, entity: Entity) -> usize {
        if let Some(last) = self.editors.last() {
            if last.entity == entity {
                return self.editors.len() - 1;
            }
        }
        let mut editor = self.editor_pool.pop().unwrap_or(EditorSlot { entity });
        editor.entity = entity;
        self.editors.push(editor);
        self.editors.len() - 1
    }

    /// Return this round's editors to the pool.
    pub fn recycle_editors(&mut self) {
        self.editor_pool.append(&mut self.editors);
    }

    /// Editors handed out since the last recycle.
    #[must_use]
    pub fn editors_in_use(&self) -> usize {
        self.editors.len()
    }

    /// Editors waiting in the pool.
    #[must_use]
    pub fn pooled_editors(&self) -> usize {
        self.editor_pool.len()
    }
}
