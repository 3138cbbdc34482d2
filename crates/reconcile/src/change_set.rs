//! Change set for tracking collection changes.
//!
//! A ChangeSet represents the difference between two states of a reconciled
//! collection, containing added, removed, and modified entities.

use alloc::vec::Vec;

/// A set of changes to a reconciled collection.
///
/// This struct tracks:
/// - `added`: Entities that entered the collection
/// - `removed`: Entities that left the collection
/// - `modified`: Entities replaced in place (old value, new value)
/// - `current_result`: The complete, display-ordered collection after the change
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSet<E> {
    /// Entities that were added
    pub added: Vec<E>,
    /// Entities that were removed
    pub removed: Vec<E>,
    /// Entities that were replaced (old, new)
    pub modified: Vec<(E, E)>,
    /// The complete collection after applying changes
    pub current_result: Vec<E>,
}

impl<E> Default for ChangeSet<E> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
            current_result: Vec::new(),
        }
    }
}

impl<E> ChangeSet<E> {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Merges another change set into this one.
    ///
    /// The later set's `current_result` wins.
    pub fn merge(&mut self, other: ChangeSet<E>) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.modified.extend(other.modified);
        self.current_result = other.current_result;
    }

    /// Adds an inserted entity.
    #[inline]
    pub fn add(&mut self, entity: E) {
        self.added.push(entity);
    }

    /// Adds a removed entity.
    #[inline]
    pub fn remove(&mut self, entity: E) {
        self.removed.push(entity);
    }

    /// Adds a modified entity pair.
    #[inline]
    pub fn modify(&mut self, old: E, new: E) {
        self.modified.push((old, new));
    }
}
