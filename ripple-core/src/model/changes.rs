//! Change sets and the accumulated change record.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use super::{Attribute, EntityKind, EntityRef, KeySet};

/// Raw changes of related objects, forwarded under a label.
///
/// `label -> source object -> raw keys that changed on the source`.
pub type ForwardedChanges = BTreeMap<Attribute, BTreeMap<EntityRef, KeySet>>;

/// What changed on one object: the observable keys, plus any raw changes of
/// related objects that were forwarded to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    keys: KeySet,
    forwarded: ForwardedChanges,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A change set holding only observable keys.
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Attribute>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            forwarded: ForwardedChanges::new(),
        }
    }

    /// Record that `source` changed `raw_keys`, under `label`.
    pub fn forward(&mut self, label: Attribute, source: EntityRef, raw_keys: &KeySet) {
        self.forwarded
            .entry(label)
            .or_default()
            .entry(source)
            .or_default()
            .extend(raw_keys.iter().cloned());
    }

    /// Observable keys that changed.
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Raw changes of related objects, by label.
    pub fn forwarded(&self) -> &ForwardedChanges {
        &self.forwarded
    }

    /// Whether the observable key `key` changed.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k.as_str() == key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.forwarded.is_empty()
    }

    /// Union `other` into this change set.
    pub fn union(&mut self, other: ChangeSet) {
        self.keys.extend(other.keys);
        for (label, sources) in other.forwarded {
            let entry = self.forwarded.entry(label).or_default();
            for (source, keys) in sources {
                entry.entry(source).or_default().extend(keys);
            }
        }
    }
}

/// Accumulated changes per object, unioned across ticks until consumed.
///
/// Equality ignores insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRecord {
    changes: IndexMap<EntityRef, ChangeSet>,
}

impl ChangeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `changes` into the entry for `object`. Empty change sets are
    /// dropped so that an object never appears with nothing changed.
    pub fn merge(&mut self, object: EntityRef, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        self.changes.entry(object).or_default().union(changes);
    }

    /// Union every entry of `other` into this record.
    pub fn merge_record(&mut self, other: ChangeRecord) {
        for (object, changes) in other.changes {
            self.merge(object, changes);
        }
    }

    /// Changes recorded for `object`.
    pub fn get(&self, object: &EntityRef) -> Option<&ChangeSet> {
        self.changes.get(object)
    }

    /// Whether anything was recorded for `object`.
    pub fn contains(&self, object: &EntityRef) -> bool {
        self.changes.contains_key(object)
    }

    /// Number of changed objects.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Drop every recorded change.
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Changed objects with their changes, in first-change order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityRef, &ChangeSet)> {
        self.changes.iter()
    }

    /// Entries grouped by entity kind, in first-seen order.
    pub fn grouped_by_kind(&self) -> IndexMap<EntityKind, Vec<(&EntityRef, &ChangeSet)>> {
        let mut groups: IndexMap<EntityKind, Vec<(&EntityRef, &ChangeSet)>> = IndexMap::new();
        for (object, changes) in &self.changes {
            groups
                .entry(object.kind().clone())
                .or_default()
                .push((object, changes));
        }
        groups
    }
}

impl IntoIterator for ChangeRecord {
    type Item = (EntityRef, ChangeSet);
    type IntoIter = indexmap::map::IntoIter<EntityRef, ChangeSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl FromIterator<(EntityRef, ChangeSet)> for ChangeRecord {
    fn from_iter<T: IntoIterator<Item = (EntityRef, ChangeSet)>>(iter: T) -> Self {
        let mut record = ChangeRecord::new();
        for (object, changes) in iter {
            record.merge(object, changes);
        }
        record
    }
}
