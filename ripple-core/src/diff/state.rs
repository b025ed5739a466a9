//! Duplicate-free ordered collections.

use std::hash::Hash;

use indexmap::IndexSet;

use crate::error::DiffError;

/// An ordered collection without duplicates, with O(1) position lookup.
///
/// Backed by an [`IndexSet`], so the element order and the
/// element-to-position map cannot drift apart.
#[derive(Debug, Clone)]
pub struct OrderedState<T: Hash + Eq> {
    items: IndexSet<T>,
}

impl<T: Hash + Eq> OrderedState<T> {
    /// Build a state from a sequence. Fails on the first repeated element.
    pub fn new(items: impl IntoIterator<Item = T>) -> Result<Self, DiffError> {
        let mut set = IndexSet::new();
        for (index, item) in items.into_iter().enumerate() {
            if !set.insert(item) {
                return Err(DiffError::DuplicateElement { index });
            }
        }
        Ok(Self { items: set })
    }

    /// Wrap an existing index set; its order is the collection order.
    pub fn from_index_set(items: IndexSet<T>) -> Self {
        Self { items }
    }

    /// Position of `item`, if present.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.get_index_of(item)
    }

    /// Whether `item` is in the collection.
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get_index(index)
    }

    /// Relocate the element at `from` to `to`, shifting the elements in
    /// between. Returns `false` and leaves the state untouched if either
    /// position is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        self.items.move_index(from, to);
        true
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Unwrap into the backing index set.
    pub fn into_inner(self) -> IndexSet<T> {
        self.items
    }
}

/// Two states are equal when they hold the same elements in the same order.
impl<T: Hash + Eq> PartialEq for OrderedState<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len() && self.items.iter().eq(other.items.iter())
    }
}

impl<T: Hash + Eq> Eq for OrderedState<T> {}

impl<T: Hash + Eq> Default for OrderedState<T> {
    fn default() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }
}
