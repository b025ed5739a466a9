//! Ordered-Collection Differ
//!
//! Computes the deletions, insertions, in-place updates and moves that turn
//! one duplicate-free ordered collection into another, in a form list widgets
//! can animate directly.
//!
//! # Algorithm
//!
//! 1. Walk the before-state. Elements also present in the after-state
//!    survive (and are reported as updated if flagged); the others are
//!    deleted.
//! 2. Elements only present in the after-state are inserted, in ascending
//!    after-position.
//! 3. Build an intermediate sequence: the survivors in before-order with each
//!    insertion spliced in at its after-position.
//! 4. Walk the after-state. Wherever the intermediate sequence disagrees,
//!    relocate the expected element to the current position and record a
//!    move, using the [`MoveMode`] convention for the `from` side.
//!
//! The differ holds no state between calls. [`ListSnapshot`] keeps the last
//! state of one observed list and diffs each refresh against it.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use ripple_core::diff::{self, MoveMode, MovedIndex};
//!
//! let before = ["a", "b", "c"];
//! let after = ["c", "a", "b"];
//! let script = diff::calculate(&before, &after, &HashSet::new(), MoveMode::FromStart).unwrap();
//! assert_eq!(script.moves(), &[MovedIndex::new(2, 0)]);
//! ```

mod script;
mod snapshot;
mod state;

pub use script::{EditScript, MoveMode, MovedIndex};
pub use snapshot::ListSnapshot;
pub use state::OrderedState;

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use tracing::trace;

use crate::error::DiffError;

/// Diff two sequences. Fails if either contains the same element twice.
pub fn calculate<T: Hash + Eq + Clone>(
    before: &[T],
    after: &[T],
    updated: &HashSet<T>,
    mode: MoveMode,
) -> Result<EditScript, DiffError> {
    let before = OrderedState::new(before.iter().cloned())?;
    let after = OrderedState::new(after.iter().cloned())?;
    Ok(calculate_states(&before, &after, updated, mode))
}

/// Diff two ordered states.
///
/// Elements in `updated` that do not survive are ignored.
pub fn calculate_states<T: Hash + Eq + Clone>(
    before: &OrderedState<T>,
    after: &OrderedState<T>,
    updated: &HashSet<T>,
    mode: MoveMode,
) -> EditScript {
    let mut deleted = BTreeSet::new();
    let mut updated_indexes = BTreeSet::new();
    let mut placed = vec![false; after.len()];
    let mut survivors = Vec::with_capacity(before.len().min(after.len()));

    for (index, item) in before.iter().enumerate() {
        match after.index_of(item) {
            Some(after_index) => {
                placed[after_index] = true;
                if updated.contains(item) {
                    updated_indexes.insert(index);
                }
                survivors.push(item.clone());
            }
            None => {
                deleted.insert(index);
            }
        }
    }

    let inserted: BTreeSet<usize> = placed
        .iter()
        .enumerate()
        .filter(|(_, placed)| !**placed)
        .map(|(index, _)| index)
        .collect();

    // Ascending order keeps every splice position within bounds.
    let mut intermediate = survivors;
    for &index in &inserted {
        if let Some(item) = after.get(index) {
            intermediate.insert(index, item.clone());
        }
    }
    let mut intermediate = OrderedState::from_index_set(intermediate.into_iter().collect());

    let moves = calculate_moves(before, after, &mut intermediate, mode);

    trace!(
        deleted = deleted.len(),
        inserted = inserted.len(),
        updated = updated_indexes.len(),
        moves = moves.len(),
        %mode,
        "Calculated edit script"
    );

    EditScript::new(deleted, inserted, updated_indexes, moves, mode)
}

fn calculate_moves<T: Hash + Eq>(
    before: &OrderedState<T>,
    after: &OrderedState<T>,
    intermediate: &mut OrderedState<T>,
    mode: MoveMode,
) -> Vec<MovedIndex> {
    let mut moves = Vec::new();

    for (index, item) in after.iter().enumerate() {
        let Some(current) = intermediate.index_of(item) else {
            continue;
        };
        if current == index {
            continue;
        }

        match mode {
            MoveMode::FromStart => {
                // Only elements of the before-state can be moved.
                if let Some(from) = before.index_of(item) {
                    moves.push(MovedIndex::new(from, index));
                    intermediate.move_item(current, index);
                }
            }
            MoveMode::FromIntermediate => {
                intermediate.move_item(current, index);
                moves.push(MovedIndex::new(current, index));
            }
        }
    }

    moves
}
