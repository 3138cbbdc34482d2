//! Carelink Core - Entity model shared by every synchronized collection.
//!
//! This crate provides the foundational types for the carelink realtime layer:
//!
//! - `Entity`: The shape every synchronized record shares (id, household, timestamps)
//! - `CareTask` / `Recurrence`: Tasks with a recurrence policy
//! - `TaskCompletion`: Per-day completion records keyed by `(task_id, date)`
//! - `records`: Location logs, safe zones, alerts, check-ins and journal entries
//! - `RawChange` / `ChangeEvent`: Change-stream payloads, raw and typed
//! - `Error`: Error taxonomy for fetch, mutation and subscription failures
//!
//! # Example
//!
//! ```rust
//! use carelink_core::{CareTask, ChangeEvent, RawChange};
//! use serde_json::json;
//!
//! let raw: RawChange = serde_json::from_value(json!({
//!     "eventType": "INSERT",
//!     "table": "care_tasks",
//!     "new": {
//!         "id": "t1",
//!         "household_id": "h1",
//!         "title": "Morning pills",
//!         "time": "08:00",
//!         "recurrence": "specific_days",
//!         "recurrence_days": ["Mon", "wed"],
//!         "created_at": "2024-05-06T08:00:00Z",
//!         "updated_at": "2024-05-06T08:00:00Z"
//!     },
//!     "old": {}
//! }))
//! .unwrap();
//!
//! match raw.decode::<CareTask>().unwrap() {
//!     ChangeEvent::Insert(task) => assert_eq!(task.title, "Morning pills"),
//!     other => panic!("unexpected event {:?}", other),
//! }
//! ```

#![no_std]

extern crate alloc;

pub mod calendar;
mod completion;
mod entity;
mod error;
mod event;
pub mod records;
mod task;

pub use calendar::{parse_weekday, weekday_token, DayScope, WeekdaySet};
pub use completion::{CompletionDraft, CompletionKey, CompletionStatus, TaskCompletion};
pub use entity::{Entity, EntityId, HouseholdId};
pub use error::{Error, Result};
pub use event::{decode_row, ChangeEvent, ChangeKind, RawChange};
pub use records::{Alert, CheckIn, CheckInDraft, JournalDraft, JournalEntry, LocationLog, SafeZone};
pub use task::{CareTask, Recurrence, RecurrenceColumns, RecurrenceKind, TaskDraft};

// Re-export the date types that appear in public signatures.
pub use chrono::{DateTime, NaiveDate, Utc, Weekday};
