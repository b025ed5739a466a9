//! The per-tick touched-objects batch.

use indexmap::IndexSet;

use super::EntityRef;

/// Objects touched by one transaction tick.
///
/// The four sets are expected to be disjoint. `refreshed` holds objects whose
/// fields were reloaded from the backing storage without a field-level write,
/// for example after merging changes from another context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedObjects {
    pub inserted: IndexSet<EntityRef>,
    pub updated: IndexSet<EntityRef>,
    pub deleted: IndexSet<EntityRef>,
    pub refreshed: IndexSet<EntityRef>,
}

impl ModifiedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add inserted objects.
    pub fn with_inserted(mut self, objects: impl IntoIterator<Item = EntityRef>) -> Self {
        self.inserted.extend(objects);
        self
    }

    /// Add updated objects.
    pub fn with_updated(mut self, objects: impl IntoIterator<Item = EntityRef>) -> Self {
        self.updated.extend(objects);
        self
    }

    /// Add deleted objects.
    pub fn with_deleted(mut self, objects: impl IntoIterator<Item = EntityRef>) -> Self {
        self.deleted.extend(objects);
        self
    }

    /// Add objects refreshed from outside the session.
    pub fn with_refreshed(mut self, objects: impl IntoIterator<Item = EntityRef>) -> Self {
        self.refreshed.extend(objects);
        self
    }

    /// Updated and refreshed objects, each listed once.
    pub fn updated_and_refreshed(&self) -> IndexSet<EntityRef> {
        self.updated.union(&self.refreshed).cloned().collect()
    }

    /// Fold another batch into this one, set by set.
    pub fn merge(&mut self, other: &ModifiedObjects) {
        self.inserted.extend(other.inserted.iter().cloned());
        self.updated.extend(other.updated.iter().cloned());
        self.deleted.extend(other.deleted.iter().cloned());
        self.refreshed.extend(other.refreshed.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.refreshed.is_empty()
    }

    /// Total number of entries across the four sets.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len() + self.refreshed.len()
    }
}
