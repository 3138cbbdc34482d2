//! Carelink Reconcile - Merges change events into local collections.
//!
//! A `ReconciledCollection` mirrors the subset of one remote table that a
//! mounted scope cares about. It is seeded from a snapshot and then kept up to
//! date by applying `ChangeEvent`s, which may arrive duplicated, replayed after
//! a reconnect, or interleaved arbitrarily across entities.
//!
//! # Core Concepts
//!
//! - `Membership`: Which entities belong in the collection and in what order
//! - `ReconciledCollection`: The merged, sorted collection
//! - `ChangeSet`: What one merge added, removed or modified
//! - `ObserverManager`: Callbacks notified with every non-empty change set
//!
//! # Merge Rules
//!
//! - INSERT of a present id is a no-op
//! - UPDATE replaces, inserts, or removes depending on membership
//! - DELETE removes if present
//! - Events for one id apply in arrival order; a snapshot reload resolves
//!   anything replayed or missed across a reconnect
//!
//! Every rule is idempotent and commutes across distinct ids.
//!
//! # Example
//!
//! ```ignore
//! use carelink_reconcile::{ReconciledCollection, TaskDay};
//! use carelink_core::{ChangeEvent, DayScope};
//!
//! let mut tasks = ReconciledCollection::new(TaskDay::new(DayScope::for_date(today)));
//! tasks.observe(|changes| render(&changes.current_result));
//!
//! tasks.seed(snapshot_rows);
//! tasks.apply(ChangeEvent::Update(edited_task));
//! ```

#![no_std]

extern crate alloc;

pub mod change_set;
pub mod collection;
pub mod membership;
pub mod observer;

pub use change_set::ChangeSet;
pub use collection::ReconciledCollection;
pub use membership::{ActiveZones, CompletionDay, Membership, Newest, TaskDay};
pub use observer::{ChangeCallback, ObserverId, ObserverManager};

// Re-export commonly used types from dependencies
pub use carelink_core::{ChangeEvent, Entity, EntityId};
