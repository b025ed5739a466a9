//! Coarse change accumulation.

use bitflags::bitflags;
use indexmap::IndexMap;
use tracing::debug;

use super::ChangeDetector;
use crate::model::{ChangeSet, EntityRef, ModifiedObjects};
use crate::store::ObjectStore;

bitflags! {
    /// What may have happened to an object since the last consumption.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PotentialChanges: u8 {
        const UPDATED = 1 << 0;
        const INSERTED = 1 << 1;
        const DELETED = 1 << 2;
    }
}

pub type PotentialChangeRecord = IndexMap<EntityRef, PotentialChanges>;

/// Remembers which objects were touched, without resolving keys.
#[derive(Debug, Default)]
pub struct PotentialChangeDetector {
    pending: ModifiedObjects,
}

impl PotentialChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl ChangeDetector for PotentialChangeDetector {
    type Output = PotentialChangeRecord;

    fn reset(&mut self) {
        self.pending = ModifiedObjects::new();
    }

    /// The key-level detail is dropped; the object counts as updated.
    fn add(&mut self, _changes: ChangeSet, object: EntityRef) {
        self.pending.updated.insert(object);
    }

    fn detect_changes<S: ObjectStore + ?Sized>(&mut self, batch: &ModifiedObjects, _store: &S) {
        self.pending.merge(batch);
    }

    /// Drain everything into one flag set per object.
    fn consume(&mut self) -> PotentialChangeRecord {
        let pending = std::mem::take(&mut self.pending);
        let mut record = PotentialChangeRecord::new();

        for object in pending.updated.into_iter().chain(pending.refreshed) {
            *record.entry(object).or_default() |= PotentialChanges::UPDATED;
        }
        for object in pending.inserted {
            *record.entry(object).or_default() |= PotentialChanges::INSERTED;
        }
        for object in pending.deleted {
            *record.entry(object).or_default() |= PotentialChanges::DELETED;
        }

        debug!(objects = record.len(), "Consumed potential changes");
        record
    }
}
