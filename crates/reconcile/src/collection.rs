//! The reconciled collection.
//!
//! Holds the members of one scope in display order and merges change events
//! into them. Merges are idempotent and commute across distinct ids. Events
//! for one id are applied in the order they arrive; the channel delivers them
//! in order, and a snapshot reload covers anything missed or replayed.

use crate::change_set::ChangeSet;
use crate::membership::Membership;
use crate::observer::{ObserverId, ObserverManager};
use alloc::vec::Vec;
use carelink_core::{ChangeEvent, Entity, EntityId};
use hashbrown::HashSet;

/// A local, display-ordered mirror of one scope of a remote table.
///
/// # Example
///
/// ```ignore
/// let mut alerts = ReconciledCollection::new(Newest);
/// alerts.seed(snapshot);
///
/// let changes = alerts.apply(ChangeEvent::Insert(alert.clone()));
/// let again = alerts.apply(ChangeEvent::Insert(alert));
/// assert!(again.is_empty());
/// ```
pub struct ReconciledCollection<E, M> {
    /// Decides membership and display order
    membership: M,
    /// Members in display order
    items: Vec<E>,
    /// Ids whose current value came from a local optimistic write
    provisional: HashSet<EntityId>,
    /// UI callbacks
    observers: ObserverManager<E>,
}

impl<E, M> ReconciledCollection<E, M>
where
    E: Entity,
    M: Membership<E>,
{
    /// Creates an empty collection.
    pub fn new(membership: M) -> Self {
        Self {
            membership,
            items: Vec::new(),
            provisional: HashSet::new(),
            observers: ObserverManager::new(),
        }
    }

    /// Returns the members in display order.
    #[inline]
    pub fn items(&self) -> &[E] {
        &self.items
    }

    /// Returns a member by id.
    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id)
    }

    /// Returns true if the id is a member.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.position(id).is_some()
    }

    /// Returns the number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the membership predicate.
    #[inline]
    pub fn membership(&self) -> &M {
        &self.membership
    }

    /// Returns true if the member's current value came from an optimistic
    /// write that no authoritative event has confirmed yet.
    pub fn is_provisional(&self, id: &EntityId) -> bool {
        self.provisional.contains(id)
    }

    /// Registers a callback invoked with every non-empty change set.
    ///
    /// Callbacks run while the collection is being mutated; they receive the
    /// full result in `current_result` and must not reach back into the
    /// collection.
    pub fn observe<F>(&mut self, callback: F) -> ObserverId
    where
        F: Fn(&ChangeSet<E>) + 'static,
    {
        self.observers.observe(callback)
    }

    /// Removes an observer.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.observers.unobserve(id)
    }

    /// Replaces the whole collection with a snapshot.
    ///
    /// Rows outside the membership are dropped; duplicate ids keep the first
    /// occurrence. Optimistic markers are reset.
    pub fn seed(&mut self, rows: Vec<E>) -> ChangeSet<E> {
        let mut next: Vec<E> = Vec::with_capacity(rows.len());
        let mut ids: HashSet<EntityId> = HashSet::with_capacity(rows.len());
        for row in rows {
            if !ids.insert(row.id().clone()) {
                continue;
            }
            if self.membership.admits(&row) {
                next.push(row);
            }
        }
        self.provisional.clear();

        let mut changes = ChangeSet::new();
        let previous = core::mem::take(&mut self.items);
        for old in &previous {
            match next.iter().find(|e| e.id() == old.id()) {
                Some(new) if new != old => changes.modify(old.clone(), new.clone()),
                Some(_) => {}
                None => changes.remove(old.clone()),
            }
        }
        for new in &next {
            if !previous.iter().any(|e| e.id() == new.id()) {
                changes.add(new.clone());
            }
        }

        self.items = next;
        self.sort();
        self.publish(changes)
    }

    /// Merges one change event.
    pub fn apply(&mut self, event: ChangeEvent<E>) -> ChangeSet<E> {
        let changes = self.merge(event);
        self.publish(changes)
    }

    /// Merges several events, notifying observers once.
    pub fn apply_batch<I>(&mut self, events: I) -> ChangeSet<E>
    where
        I: IntoIterator<Item = ChangeEvent<E>>,
    {
        let mut changes = ChangeSet::new();
        for event in events {
            changes.merge(self.merge(event));
        }
        self.publish(changes)
    }

    /// Applies a local write ahead of its authoritative event.
    ///
    /// The entity is placed (or removed, if it no longer belongs) and its id
    /// is marked provisional. The next event for the id replaces it, even an
    /// INSERT that would otherwise be a no-op.
    pub fn apply_optimistic(&mut self, entity: E) -> ChangeSet<E> {
        let id = entity.id().clone();
        let changes = self.place(entity);
        self.provisional.insert(id);
        self.publish(changes)
    }

    /// Undoes an optimistic write whose remote call failed.
    ///
    /// `prior` is the member as it was before the optimistic write, or `None`
    /// if it wasn't a member.
    pub fn revert_optimistic(&mut self, id: &EntityId, prior: Option<E>) -> ChangeSet<E> {
        if !self.provisional.remove(id) {
            return self.publish(ChangeSet::new());
        }
        let changes = match prior {
            Some(entity) => self.place(entity),
            None => self.take(id),
        };
        self.publish(changes)
    }

    fn merge(&mut self, event: ChangeEvent<E>) -> ChangeSet<E> {
        match event {
            ChangeEvent::Insert(entity) => self.merge_insert(entity),
            ChangeEvent::Update(entity) => self.merge_update(entity),
            ChangeEvent::Delete(id) => self.merge_delete(id),
        }
    }

    fn merge_insert(&mut self, entity: E) -> ChangeSet<E> {
        let confirms_optimistic = self.provisional.remove(entity.id());
        if self.contains(entity.id()) && !confirms_optimistic {
            return ChangeSet::new();
        }
        self.place(entity)
    }

    fn merge_update(&mut self, entity: E) -> ChangeSet<E> {
        self.provisional.remove(entity.id());
        self.place(entity)
    }

    fn merge_delete(&mut self, id: EntityId) -> ChangeSet<E> {
        self.provisional.remove(&id);
        self.take(&id)
    }

    /// Puts an entity where its membership says it belongs: replaced in
    /// place, inserted, or removed.
    fn place(&mut self, entity: E) -> ChangeSet<E> {
        let mut changes = ChangeSet::new();
        let position = self.position(entity.id());
        match (position, self.membership.admits(&entity)) {
            (Some(pos), true) => {
                if self.items[pos] != entity {
                    let old = core::mem::replace(&mut self.items[pos], entity.clone());
                    changes.modify(old, entity);
                    self.sort();
                }
            }
            (Some(pos), false) => {
                let old = self.items.remove(pos);
                changes.remove(old);
            }
            (None, true) => {
                self.items.push(entity.clone());
                changes.add(entity);
                self.sort();
            }
            (None, false) => {}
        }
        changes
    }

    fn take(&mut self, id: &EntityId) -> ChangeSet<E> {
        let mut changes = ChangeSet::new();
        if let Some(pos) = self.position(id) {
            changes.remove(self.items.remove(pos));
        }
        changes
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    fn sort(&mut self) {
        let membership = &self.membership;
        self.items.sort_by(|a, b| {
            membership
                .cmp_display(a, b)
                .then_with(|| a.id().cmp(b.id()))
        });
    }

    fn publish(&self, mut changes: ChangeSet<E>) -> ChangeSet<E> {
        changes.current_result = self.items.clone();
        self.observers.notify_all(&changes);
        changes
    }
}

impl<E, M> core::fmt::Debug for ReconciledCollection<E, M>
where
    E: Entity,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReconciledCollection")
            .field("items", &self.items)
            .field("provisional", &self.provisional.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}
