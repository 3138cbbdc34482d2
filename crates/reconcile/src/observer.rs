//! Observer management for reconciled collections.
//!
//! Observers are the UI side: callbacks re-rendered with the change set
//! produced by each merge.

use crate::change_set::ChangeSet;
use alloc::boxed::Box;
use hashbrown::HashMap;

/// Unique identifier for an observer.
pub type ObserverId = u64;

/// Callback type for change notifications.
pub type ChangeCallback<E> = Box<dyn Fn(&ChangeSet<E>)>;

/// Manages the observers of one collection.
pub struct ObserverManager<E> {
    /// Registered callbacks
    observers: HashMap<ObserverId, ChangeCallback<E>>,
    /// Next observer ID to assign
    next_id: ObserverId,
}

impl<E> Default for ObserverManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ObserverManager<E> {
    /// Creates a new observer manager.
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a callback.
    ///
    /// Returns the observer ID that can be used to remove it.
    pub fn observe<F>(&mut self, callback: F) -> ObserverId
    where
        F: Fn(&ChangeSet<E>) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.insert(id, Box::new(callback));
        id
    }

    /// Removes an observer by ID.
    ///
    /// Returns true if the observer was found and removed.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    /// Notifies all observers of a non-empty change set.
    pub fn notify_all(&self, changes: &ChangeSet<E>) {
        if changes.is_empty() {
            return;
        }
        for callback in self.observers.values() {
            callback(changes);
        }
    }

    /// Returns the number of observers.
    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if there are no observers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
