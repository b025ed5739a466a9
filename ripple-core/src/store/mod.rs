//! Object Store Interface
//!
//! The persistence layer is not part of this crate. This module defines the
//! narrow read-only view change detection needs from it, and an in-memory
//! implementation for tests, benchmarks and embedding in simple hosts.
//!
//! # What the detectors ask for
//!
//! - the current value of a raw attribute, for snapshot diffing,
//! - the objects currently reachable through a relationship, for
//!   propagation and for relationship snapshots,
//! - the raw keys written since the last checkpoint ("pending changes"),
//! - whether those pending changes can be trusted right now.
//!
//! The last point replaces storage-engine specific fault checks: a store
//! answers `false` whenever an object's field data was evicted or reloaded
//! behind the detector's back, and the detector then diffs against its
//! snapshot instead.

mod memory;

pub use memory::MemoryStore;

use crate::model::{Attribute, EntityRef, KeySet, Value};

/// Read access to the backing object store.
pub trait ObjectStore {
    /// Current value of a raw attribute. Unknown objects and unset attributes
    /// read as [`Value::Null`].
    fn value(&self, entity: &EntityRef, attribute: &Attribute) -> Value;

    /// Objects currently reachable from `entity` through `relationship`.
    ///
    /// Deleted objects must still answer for the tick in which they were
    /// deleted, so that deletions can propagate.
    fn related(&self, entity: &EntityRef, relationship: &Attribute) -> Vec<EntityRef>;

    /// Raw keys written on `entity` since the last checkpoint.
    fn pending_changes(&self, entity: &EntityRef) -> KeySet;

    /// Whether [`ObjectStore::pending_changes`] is reliable for `entity`
    /// right now. Stores return `false` for unloaded (faulted) objects.
    fn has_reliable_pending_changes(&self, entity: &EntityRef) -> bool;
}
