//! Stateful per-list snapshots.
//!
//! A [`ListSnapshot`] remembers the last ordered state of one observed
//! collection. Whenever the collection's owner reports a refresh, the
//! snapshot diffs the fresh state against the remembered one, replaces its
//! state and hands back the edit script, or nothing when the list did not
//! change in any way a widget would care about.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::Hash;

use tracing::trace;

use super::{calculate_states, EditScript, MoveMode, OrderedState};
use crate::model::{ChangeRecord, EntityRef};

/// The last known ordered state of one observed collection.
#[derive(Debug, Clone)]
pub struct ListSnapshot<T: Hash + Eq> {
    state: OrderedState<T>,
    mode: MoveMode,
}

impl<T: Hash + Eq + Clone> ListSnapshot<T> {
    /// Start from `state`.
    pub fn new(state: OrderedState<T>, mode: MoveMode) -> Self {
        Self { state, mode }
    }

    /// The remembered state.
    pub fn state(&self) -> &OrderedState<T> {
        &self.state
    }

    /// Move convention of the produced scripts.
    pub fn mode(&self) -> MoveMode {
        self.mode
    }

    /// Replace the state with `new` and return the script leading to it.
    ///
    /// Returns `None` when `new` holds the same elements in the same order
    /// and none of them is in `updated`.
    pub fn update_with(
        &mut self,
        new: OrderedState<T>,
        updated: &HashSet<T>,
    ) -> Option<EditScript> {
        if self.state == new && !new.iter().any(|item| updated.contains(item)) {
            return None;
        }

        let script = calculate_states(&self.state, &new, updated, self.mode);
        self.state = new;
        if script.is_empty() {
            return None;
        }

        trace!(len = self.state.len(), "List snapshot changed");
        Some(script)
    }

    /// Like [`update_with`](Self::update_with), taking the updated elements
    /// from the objects of a change record.
    pub fn update(&mut self, new: OrderedState<T>, changes: &ChangeRecord) -> Option<EditScript>
    where
        T: Borrow<EntityRef>,
    {
        let updated: HashSet<T> = new
            .iter()
            .filter(|item| changes.contains(Borrow::<EntityRef>::borrow(*item)))
            .cloned()
            .collect();
        self.update_with(new, &updated)
    }

    /// Forget the remembered state. The next update reports every element
    /// as inserted.
    pub fn clear(&mut self) {
        self.state = OrderedState::default();
    }
}
