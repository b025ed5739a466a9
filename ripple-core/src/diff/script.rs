//! Edit scripts and move conventions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiffError;

/// How the `from` side of a move is expressed.
///
/// List widgets disagree on the state a move refers to, so the differ has to
/// be told which convention the consumer expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveMode {
    /// `from` is the position in the before-state. Moves are applied as one
    /// batch together with deletions and insertions (collection views).
    #[default]
    FromStart,
    /// `from` is the position in the working state after deletions,
    /// insertions and all previous moves. Moves are applied one by one
    /// (table views).
    FromIntermediate,
}

impl FromStr for MoveMode {
    type Err = DiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from-start" | "collection-view" => Ok(MoveMode::FromStart),
            "from-intermediate" | "table-view" => Ok(MoveMode::FromIntermediate),
            other => Err(DiffError::UnknownMoveMode(other.to_owned())),
        }
    }
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveMode::FromStart => f.write_str("from-start"),
            MoveMode::FromIntermediate => f.write_str("from-intermediate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovedIndex {
    pub from: usize,
    pub to: usize,
}

impl MovedIndex {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

impl From<(usize, usize)> for MovedIndex {
    fn from((from, to): (usize, usize)) -> Self {
        Self { from, to }
    }
}

/// The changes turning one ordered collection into another.
///
/// Deleted and updated positions refer to the before-state, inserted
/// positions to the after-state. How move positions are read depends on
/// [`EditScript::mode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditScript {
    deleted: BTreeSet<usize>,
    inserted: BTreeSet<usize>,
    updated: BTreeSet<usize>,
    moves: Vec<MovedIndex>,
    mode: MoveMode,
}

impl EditScript {
    pub(crate) fn new(
        deleted: BTreeSet<usize>,
        inserted: BTreeSet<usize>,
        updated: BTreeSet<usize>,
        moves: Vec<MovedIndex>,
        mode: MoveMode,
    ) -> Self {
        Self {
            deleted,
            inserted,
            updated,
            moves,
            mode,
        }
    }

    /// Before-positions of removed elements.
    pub fn deleted(&self) -> &BTreeSet<usize> {
        &self.deleted
    }

    /// After-positions of added elements.
    pub fn inserted(&self) -> &BTreeSet<usize> {
        &self.inserted
    }

    /// Before-positions of surviving elements flagged as updated.
    pub fn updated(&self) -> &BTreeSet<usize> {
        &self.updated
    }

    /// Relocations, in the order they were recorded.
    pub fn moves(&self) -> &[MovedIndex] {
        &self.moves
    }

    /// How the `from` side of each move is read.
    pub fn mode(&self) -> MoveMode {
        self.mode
    }

    /// Whether the script changes nothing.
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
            && self.inserted.is_empty()
            && self.updated.is_empty()
            && self.moves.is_empty()
    }

    /// Call `f(from, to)` for every move, in order.
    pub fn enumerate_moves(&self, mut f: impl FnMut(usize, usize)) {
        for m in &self.moves {
            f(m.from, m.to);
        }
    }

    /// Replay the script on `before`.
    ///
    /// Inserted elements are taken from `after`; everything else comes from
    /// `before`. Fails if a position in the script does not exist in the
    /// collection it refers to.
    pub fn apply<T: Clone>(&self, before: &[T], after: &[T]) -> Result<Vec<T>, DiffError> {
        if let Some(&index) = self.deleted.iter().next_back() {
            if index >= before.len() {
                return Err(mismatch("deletion", index, before.len()));
            }
        }
        if let Some(&index) = self.inserted.iter().next_back() {
            if index >= after.len() {
                return Err(mismatch("insertion", index, after.len()));
            }
        }

        match self.mode {
            MoveMode::FromStart => self.apply_batched(before, after),
            MoveMode::FromIntermediate => self.apply_sequential(before, after),
        }
    }

    fn apply_batched<T: Clone>(&self, before: &[T], after: &[T]) -> Result<Vec<T>, DiffError> {
        let len = before.len() - self.deleted.len() + self.inserted.len();
        let mut slots: Vec<Option<T>> = vec![None; len];

        for &index in &self.inserted {
            let slot = slots
                .get_mut(index)
                .ok_or_else(|| mismatch("insertion", index, len))?;
            *slot = Some(after[index].clone());
        }

        let mut moved = BTreeSet::new();
        for m in &self.moves {
            let item = before
                .get(m.from)
                .filter(|_| !self.deleted.contains(&m.from))
                .ok_or_else(|| mismatch("move source", m.from, before.len()))?;
            let slot = slots
                .get_mut(m.to)
                .filter(|slot| slot.is_none())
                .ok_or_else(|| mismatch("move target", m.to, len))?;
            *slot = Some(item.clone());
            if !moved.insert(m.from) {
                return Err(DiffError::ScriptMismatch(format!(
                    "position {} moved twice",
                    m.from
                )));
            }
        }

        let mut rest = before
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.deleted.contains(index) && !moved.contains(index))
            .map(|(_, item)| item);
        for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
            *slot = rest.next().cloned();
        }

        slots
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| DiffError::ScriptMismatch("unfilled position".to_owned()))
    }

    fn apply_sequential<T: Clone>(&self, before: &[T], after: &[T]) -> Result<Vec<T>, DiffError> {
        let mut items: Vec<T> = before
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.deleted.contains(index))
            .map(|(_, item)| item.clone())
            .collect();

        for &index in &self.inserted {
            if index > items.len() {
                return Err(mismatch("insertion", index, items.len()));
            }
            items.insert(index, after[index].clone());
        }

        for m in &self.moves {
            if m.from >= items.len() || m.to >= items.len() {
                return Err(mismatch("move", m.from.max(m.to), items.len()));
            }
            let item = items.remove(m.from);
            items.insert(m.to, item);
        }

        Ok(items)
    }
}

fn mismatch(what: &str, index: usize, len: usize) -> DiffError {
    DiffError::ScriptMismatch(format!("{what} at {index} is out of range for length {len}"))
}
