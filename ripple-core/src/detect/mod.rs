//! Change Accumulators
//!
//! A change detector is fed one touched-objects batch per tick and
//! accumulates what changed until someone consumes the result.
//!
//! # Strategies
//!
//! - [`DetailedChangeDetector`] resolves raw writes into observable keys,
//!   including keys of related objects one relationship away.
//! - [`PotentialChangeDetector`] only remembers that an object was inserted,
//!   updated or deleted.
//!
//! Both sit behind [`ChangeDetector`]. An observation session picks one and
//! keeps it; the outputs of the two are not comparable.

mod detailed;
mod potential;

pub use detailed::DetailedChangeDetector;
pub use potential::{PotentialChangeDetector, PotentialChangeRecord, PotentialChanges};

use crate::model::{ChangeSet, EntityRef, ModifiedObjects};
use crate::store::ObjectStore;

/// Common contract of the accumulator strategies.
pub trait ChangeDetector {
    /// What [`ChangeDetector::consume`] hands out.
    type Output;

    /// Forget all accumulated changes and any cached state.
    fn reset(&mut self);

    /// Merge changes produced outside the store into the accumulator.
    fn add(&mut self, changes: ChangeSet, object: EntityRef);

    /// Process one tick's touched objects.
    fn detect_changes<S: ObjectStore + ?Sized>(&mut self, batch: &ModifiedObjects, store: &S);

    /// Hand out the accumulated changes.
    fn consume(&mut self) -> Self::Output;
}
