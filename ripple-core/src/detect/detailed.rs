//! Precise change accumulation.

use std::sync::Arc;

use tracing::{debug, trace};

use super::ChangeDetector;
use crate::model::{ChangeRecord, ChangeSet, EntityRef, KeySet, ModifiedObjects};
use crate::schema::DependencyKeyStore;
use crate::snapshot::SnapshotStore;
use crate::store::ObjectStore;

/// Accumulates observable key changes per object.
///
/// Each tick, the raw keys written on every updated or refreshed object are
/// resolved through the [`DependencyKeyStore`] into observable keys on the
/// object itself and on objects one relationship away. Raw keys come from the
/// store's pending changes when those are reliable, and from snapshot diffing
/// otherwise.
///
/// [`consume`](ChangeDetector::consume) returns a copy and keeps the record;
/// [`take_changes`](Self::take_changes) drains it.
#[derive(Debug)]
pub struct DetailedChangeDetector {
    key_store: Arc<DependencyKeyStore>,
    snapshots: SnapshotStore,
    changes: ChangeRecord,
}

impl DetailedChangeDetector {
    pub fn new(key_store: Arc<DependencyKeyStore>) -> Self {
        Self {
            snapshots: SnapshotStore::new(Arc::clone(&key_store)),
            key_store,
            changes: ChangeRecord::new(),
        }
    }

    /// The dependency table used for propagation.
    pub fn key_store(&self) -> &Arc<DependencyKeyStore> {
        &self.key_store
    }

    /// Snapshots taken so far.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Accumulated changes, without consuming them.
    pub fn changes(&self) -> &ChangeRecord {
        &self.changes
    }

    /// Drain the accumulated changes. Snapshots are kept.
    pub fn take_changes(&mut self) -> ChangeRecord {
        std::mem::take(&mut self.changes)
    }

    /// Drop all snapshots but keep the accumulated changes.
    pub fn clear_snapshots(&mut self) {
        self.snapshots.clear();
    }

    fn raw_changed_keys<S: ObjectStore + ?Sized>(
        &mut self,
        object: &EntityRef,
        store: &S,
    ) -> KeySet {
        let pending = store.pending_changes(object);
        if !pending.is_empty() && store.has_reliable_pending_changes(object) {
            self.snapshots.update_snapshot(object, store);
            return pending;
        }

        trace!(object = %object, "Pending changes unavailable, diffing snapshot");
        self.snapshots.extract_changed_keys(object, store)
    }

    fn merge_related(&mut self, related: impl IntoIterator<Item = (EntityRef, ChangeSet)>) {
        for (target, changes) in related {
            self.changes.merge(target, changes);
        }
    }
}

impl ChangeDetector for DetailedChangeDetector {
    type Output = ChangeRecord;

    fn reset(&mut self) {
        self.changes.clear();
        self.snapshots.clear();
    }

    fn add(&mut self, changes: ChangeSet, object: EntityRef) {
        self.changes.merge(object, changes);
    }

    fn detect_changes<S: ObjectStore + ?Sized>(&mut self, batch: &ModifiedObjects, store: &S) {
        let before = self.changes.len();

        for object in &batch.inserted {
            self.snapshots.create_snapshot(object, store);
        }

        for object in batch.updated_and_refreshed() {
            let raw = self.raw_changed_keys(&object, store);
            if raw.is_empty() {
                continue;
            }

            let kind = object.kind();
            let keys: KeySet = raw
                .iter()
                .flat_map(|key| self.key_store.affected_keys(kind, key).iter().cloned())
                .collect();

            if self.key_store.has_propagations(kind) {
                let related = self.key_store.affected_objects(&object, &raw, store);
                self.merge_related(related);
            }
            self.changes.merge(object, ChangeSet::from_keys(keys));
        }

        for object in batch.inserted.iter().chain(&batch.deleted) {
            let related = self
                .key_store
                .affected_objects_for_insertion_or_deletion(object, store);
            self.merge_related(related);
        }

        for object in &batch.deleted {
            self.snapshots.discard(object);
        }

        debug!(
            inserted = batch.inserted.len(),
            updated = batch.updated.len(),
            deleted = batch.deleted.len(),
            refreshed = batch.refreshed.len(),
            new_objects = self.changes.len().saturating_sub(before),
            "Detected changes"
        );
    }

    fn consume(&mut self) -> ChangeRecord {
        self.changes.clone()
    }
}
