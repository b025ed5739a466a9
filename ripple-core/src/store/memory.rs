//! In-memory object store.

use std::collections::HashMap;

use crate::model::{Attribute, EntityKind, EntityRef, KeySet, ModifiedObjects, ObjectId, Value};

use super::ObjectStore;

#[derive(Debug, Default, Clone)]
struct Record {
    values: HashMap<Attribute, Value>,
    relations: HashMap<Attribute, Vec<EntityRef>>,
    pending: KeySet,
    faulted: bool,
}

/// A minimal mutable object graph that tracks its own touched-objects batch.
///
/// Writes record pending raw keys until [`MemoryStore::save`]; the batch of
/// touched objects accumulates until [`MemoryStore::take_batch`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: HashMap<EntityRef, Record>,
    /// Objects deleted since the last save. Kept so deletions can still be
    /// traversed while they are being processed.
    deleted: HashMap<EntityRef, Record>,
    batch: ModifiedObjects,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new, empty object of `kind`.
    pub fn insert(&mut self, kind: impl Into<EntityKind>) -> EntityRef {
        let entity = EntityRef::new(kind, ObjectId::new());
        self.objects.insert(entity.clone(), Record::default());
        self.batch.inserted.insert(entity.clone());
        entity
    }

    /// Whether `entity` exists and is not deleted.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.objects.contains_key(entity)
    }

    /// Write a raw attribute. Unknown objects are ignored.
    pub fn set(
        &mut self,
        entity: &EntityRef,
        attribute: impl Into<Attribute>,
        value: impl Into<Value>,
    ) {
        let attribute = attribute.into();
        let Some(record) = self.objects.get_mut(entity) else {
            return;
        };
        record.values.insert(attribute.clone(), value.into());
        record.pending.insert(attribute);
        self.mark_updated(entity);
    }

    /// Replace the contents of a relationship.
    pub fn relate(
        &mut self,
        entity: &EntityRef,
        relationship: impl Into<Attribute>,
        targets: impl IntoIterator<Item = EntityRef>,
    ) {
        let relationship = relationship.into();
        let Some(record) = self.objects.get_mut(entity) else {
            return;
        };
        record
            .relations
            .insert(relationship.clone(), targets.into_iter().collect());
        record.pending.insert(relationship);
        self.mark_updated(entity);
    }

    /// Append one object to a relationship.
    pub fn add_related(
        &mut self,
        entity: &EntityRef,
        relationship: impl Into<Attribute>,
        target: EntityRef,
    ) {
        let relationship = relationship.into();
        let Some(record) = self.objects.get_mut(entity) else {
            return;
        };
        let targets = record.relations.entry(relationship.clone()).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
        record.pending.insert(relationship);
        self.mark_updated(entity);
    }

    /// Remove one object from a relationship.
    pub fn remove_related(
        &mut self,
        entity: &EntityRef,
        relationship: impl Into<Attribute>,
        target: &EntityRef,
    ) {
        let relationship = relationship.into();
        let Some(record) = self.objects.get_mut(entity) else {
            return;
        };
        if let Some(targets) = record.relations.get_mut(&relationship) {
            targets.retain(|t| t != target);
        }
        record.pending.insert(relationship);
        self.mark_updated(entity);
    }

    /// Delete an object. Deleting an object inserted in the same batch
    /// removes it from the batch entirely.
    pub fn delete(&mut self, entity: &EntityRef) {
        let Some(record) = self.objects.remove(entity) else {
            return;
        };
        self.batch.updated.shift_remove(entity);
        self.batch.refreshed.shift_remove(entity);
        if !self.batch.inserted.shift_remove(entity) {
            self.batch.deleted.insert(entity.clone());
        }
        self.deleted.insert(entity.clone(), record);
    }

    /// Overwrite attributes as if reloaded from storage: values change but
    /// no pending keys are recorded, and the object's pending changes stop
    /// being reliable until the next save.
    pub fn refresh(
        &mut self,
        entity: &EntityRef,
        values: impl IntoIterator<Item = (Attribute, Value)>,
    ) {
        let Some(record) = self.objects.get_mut(entity) else {
            return;
        };
        record.values.extend(values);
        record.faulted = true;
        if !self.batch.inserted.contains(entity) && !self.batch.updated.contains(entity) {
            self.batch.refreshed.insert(entity.clone());
        }
    }

    /// Evict an object's field data, making its pending changes unreliable.
    pub fn fault(&mut self, entity: &EntityRef) {
        if let Some(record) = self.objects.get_mut(entity) {
            record.faulted = true;
        }
    }

    /// Hand out the touched-objects batch accumulated since the last call.
    pub fn take_batch(&mut self) -> ModifiedObjects {
        std::mem::take(&mut self.batch)
    }

    /// Checkpoint: drop pending keys, fault flags and deleted objects.
    pub fn save(&mut self) {
        for record in self.objects.values_mut() {
            record.pending.clear();
            record.faulted = false;
        }
        self.deleted.clear();
    }

    fn mark_updated(&mut self, entity: &EntityRef) {
        if self.batch.inserted.contains(entity) {
            return;
        }
        self.batch.refreshed.shift_remove(entity);
        self.batch.updated.insert(entity.clone());
    }

    fn record(&self, entity: &EntityRef) -> Option<&Record> {
        self.objects.get(entity).or_else(|| self.deleted.get(entity))
    }
}

impl ObjectStore for MemoryStore {
    fn value(&self, entity: &EntityRef, attribute: &Attribute) -> Value {
        self.record(entity)
            .and_then(|r| r.values.get(attribute))
            .cloned()
            .unwrap_or_default()
    }

    fn related(&self, entity: &EntityRef, relationship: &Attribute) -> Vec<EntityRef> {
        self.record(entity)
            .and_then(|r| r.relations.get(relationship))
            .cloned()
            .unwrap_or_default()
    }

    fn pending_changes(&self, entity: &EntityRef) -> KeySet {
        self.record(entity)
            .map(|r| r.pending.clone())
            .unwrap_or_default()
    }

    fn has_reliable_pending_changes(&self, entity: &EntityRef) -> bool {
        self.record(entity).is_some_and(|r| !r.faulted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_tracked_in_the_batch() {
        let mut store = MemoryStore::new();
        let user = store.insert("User");
        store.set(&user, "name", "Ada");

        let batch = store.take_batch();
        assert!(batch.inserted.contains(&user));
        assert!(batch.updated.is_empty());
        assert_eq!(store.value(&user, &Attribute::new("name")), Value::from("Ada"));
        assert!(store.take_batch().is_empty());

        store.save();
        store.set(&user, "name", "Grace");
        let batch = store.take_batch();
        assert!(batch.updated.contains(&user));
        assert_eq!(
            store.pending_changes(&user),
            KeySet::from([Attribute::new("name")])
        );
    }

    #[test]
    fn deleted_objects_stay_traversable_until_save() {
        let mut store = MemoryStore::new();
        let user = store.insert("User");
        let conv = store.insert("Conversation");
        store.relate(&user, "conversations", [conv.clone()]);
        store.take_batch();
        store.save();

        store.delete(&user);
        let batch = store.take_batch();
        assert!(batch.deleted.contains(&user));
        assert!(!store.contains(&user));
        assert_eq!(
            store.related(&user, &Attribute::new("conversations")),
            vec![conv]
        );

        store.save();
        assert!(store.related(&user, &Attribute::new("conversations")).is_empty());
    }

    #[test]
    fn deleting_a_fresh_insert_drops_it_from_the_batch() {
        let mut store = MemoryStore::new();
        let user = store.insert("User");
        store.delete(&user);
        assert!(store.take_batch().is_empty());
    }

    #[test]
    fn refresh_makes_pending_changes_unreliable() {
        let mut store = MemoryStore::new();
        let user = store.insert("User");
        store.take_batch();
        store.save();

        store.refresh(&user, [(Attribute::new("name"), Value::from("Ada"))]);
        let batch = store.take_batch();
        assert!(batch.refreshed.contains(&user));
        assert!(store.pending_changes(&user).is_empty());
        assert!(!store.has_reliable_pending_changes(&user));
    }
}
