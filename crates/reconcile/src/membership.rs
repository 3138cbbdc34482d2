//! Membership predicates and display orders.
//!
//! A membership decides whether an entity belongs in a collection and how
//! members are ordered for display. The collection breaks ties by id, so
//! implementations don't need to.

use carelink_core::{CareTask, DayScope, Entity, NaiveDate, SafeZone, TaskCompletion};
use carelink_recurrence::{OneTimeMatch, Resolver};
use core::cmp::Ordering;

/// Which entities a collection holds, and in what order.
pub trait Membership<E> {
    /// Returns true if the entity belongs in the collection.
    fn admits(&self, entity: &E) -> bool;

    /// Display order of two members.
    fn cmp_display(&self, a: &E, b: &E) -> Ordering;
}

/// Active care tasks visible on one day, ordered by time of day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskDay {
    scope: DayScope,
    resolver: Resolver,
}

impl TaskDay {
    /// Creates a day membership using the default resolver.
    pub fn new(scope: DayScope) -> Self {
        Self {
            scope,
            resolver: Resolver::default(),
        }
    }

    /// Creates a day membership with an explicit one-time matching rule.
    pub fn with_one_time_match(scope: DayScope, one_time: OneTimeMatch) -> Self {
        Self {
            scope,
            resolver: Resolver::new(one_time),
        }
    }

    /// Returns the target day.
    #[inline]
    pub fn scope(&self) -> &DayScope {
        &self.scope
    }

    /// Returns the resolver used for visibility.
    #[inline]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

impl Membership<CareTask> for TaskDay {
    fn admits(&self, task: &CareTask) -> bool {
        self.resolver.is_visible_in(task, &self.scope)
    }

    fn cmp_display(&self, a: &CareTask, b: &CareTask) -> Ordering {
        a.cmp_schedule(b)
    }
}

/// Completion records for one calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionDay {
    date: NaiveDate,
}

impl CompletionDay {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Membership<TaskCompletion> for CompletionDay {
    fn admits(&self, completion: &TaskCompletion) -> bool {
        completion.date == self.date
    }

    fn cmp_display(&self, a: &TaskCompletion, b: &TaskCompletion) -> Ordering {
        a.task_id.cmp(&b.task_id)
    }
}

/// Safe zones that have not been soft-deleted, ordered by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveZones;

impl Membership<SafeZone> for ActiveZones {
    fn admits(&self, zone: &SafeZone) -> bool {
        zone.active
    }

    fn cmp_display(&self, a: &SafeZone, b: &SafeZone) -> Ordering {
        a.name.cmp(&b.name)
    }
}

/// Every row, newest first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Newest;

impl<E: Entity> Membership<E> for Newest {
    fn admits(&self, _entity: &E) -> bool {
        true
    }

    fn cmp_display(&self, a: &E, b: &E) -> Ordering {
        b.created_at().cmp(&a.created_at())
    }
}
