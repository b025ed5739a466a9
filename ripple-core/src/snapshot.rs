//! Snapshot Store
//!
//! Keeps the last-known raw values of every object the detectors have seen,
//! so that "what changed" can be recovered when the store can no longer say
//! (the object was faulted, or its fields were reloaded by a merge).
//!
//! # What a snapshot holds
//!
//! - every declared raw attribute's value,
//! - the element count of every to-many relationship,
//! - whether every to-one relationship is set.
//!
//! # Read-refreshes
//!
//! [`SnapshotStore::extract_changed_keys`] diffs and then overwrites the
//! snapshot with the live values. A second call without an intervening
//! mutation therefore returns nothing. Snapshots reflect the values as of the
//! last detection pass, not the live ones.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::model::{Attribute, EntityRef, KeySet, Value};
use crate::schema::{Cardinality, DependencyKeyStore};
use crate::store::ObjectStore;

/// Last-known raw state of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    attributes: HashMap<Attribute, Value>,
    to_many: HashMap<Attribute, usize>,
    to_one: HashMap<Attribute, bool>,
}

impl Snapshot {
    /// Last known value of a raw attribute.
    pub fn attribute(&self, name: &Attribute) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Last known size of a to-many relationship.
    pub fn to_many_count(&self, name: &Attribute) -> Option<usize> {
        self.to_many.get(name).copied()
    }

    /// Whether a to-one relationship was set.
    pub fn to_one_is_set(&self, name: &Attribute) -> Option<bool> {
        self.to_one.get(name).copied()
    }

    /// Keys whose value in `self` differs from `current`.
    fn changed_keys(&self, current: &Snapshot) -> KeySet {
        let mut changed = KeySet::new();
        for (key, value) in &self.attributes {
            if current.attributes.get(key) != Some(value) {
                changed.insert(key.clone());
            }
        }
        for (key, count) in &self.to_many {
            if current.to_many.get(key) != Some(count) {
                changed.insert(key.clone());
            }
        }
        for (key, is_set) in &self.to_one {
            if current.to_one.get(key) != Some(is_set) {
                changed.insert(key.clone());
            }
        }
        changed
    }
}

/// Per-session cache of object snapshots.
#[derive(Debug)]
pub struct SnapshotStore {
    key_store: Arc<DependencyKeyStore>,
    snapshots: HashMap<EntityRef, Snapshot>,
}

impl SnapshotStore {
    pub fn new(key_store: Arc<DependencyKeyStore>) -> Self {
        Self {
            key_store,
            snapshots: HashMap::new(),
        }
    }

    /// Capture the current values of a newly inserted object. Does nothing if
    /// a snapshot already exists.
    pub fn create_snapshot<S: ObjectStore + ?Sized>(&mut self, entity: &EntityRef, store: &S) {
        if self.snapshots.contains_key(entity) {
            return;
        }
        if let Some(snapshot) = self.capture(entity, store) {
            self.snapshots.insert(entity.clone(), snapshot);
        }
    }

    /// Overwrite the snapshot with the current values.
    pub fn update_snapshot<S: ObjectStore + ?Sized>(&mut self, entity: &EntityRef, store: &S) {
        if let Some(snapshot) = self.capture(entity, store) {
            self.snapshots.insert(entity.clone(), snapshot);
        }
    }

    /// Diff the live values against the snapshot and refresh the snapshot.
    ///
    /// An object without a snapshot gets one and reports no changes.
    pub fn extract_changed_keys<S: ObjectStore + ?Sized>(
        &mut self,
        entity: &EntityRef,
        store: &S,
    ) -> KeySet {
        let Some(current) = self.capture(entity, store) else {
            return KeySet::new();
        };
        let changed = match self.snapshots.get(entity) {
            Some(previous) => previous.changed_keys(&current),
            None => KeySet::new(),
        };
        trace!(entity = %entity, changed = changed.len(), "Diffed snapshot");
        self.snapshots.insert(entity.clone(), current);
        changed
    }

    /// The snapshot of `entity`, if one was taken.
    pub fn snapshot(&self, entity: &EntityRef) -> Option<&Snapshot> {
        self.snapshots.get(entity)
    }

    /// Drop the snapshot of one object, e.g. after it was deleted.
    pub fn discard(&mut self, entity: &EntityRef) {
        self.snapshots.remove(entity);
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Number of snapshots held.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Read the current raw state of `entity`. Kinds missing from the key
    /// store cannot be snapshotted.
    fn capture<S: ObjectStore + ?Sized>(&self, entity: &EntityRef, store: &S) -> Option<Snapshot> {
        let definition = self.key_store.definition(entity.kind())?;
        let mut snapshot = Snapshot::default();

        for attribute in &definition.attributes {
            snapshot
                .attributes
                .insert(attribute.clone(), store.value(entity, attribute));
        }
        for rel in &definition.relationships {
            let related = store.related(entity, &rel.name);
            match rel.cardinality {
                Cardinality::ToMany => {
                    snapshot.to_many.insert(rel.name.clone(), related.len());
                }
                Cardinality::ToOne => {
                    snapshot.to_one.insert(rel.name.clone(), !related.is_empty());
                }
            }
        }

        Some(snapshot)
    }
}
