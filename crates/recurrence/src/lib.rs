//! Carelink Recurrence - Decides which days a care task applies to.
//!
//! Two pure pieces live here:
//!
//! - `Resolver`: given a task and a target (date, weekday), is the task visible?
//! - `plan_day_removal`: what write removes a task from one weekday only?
//!
//! Neither reads the clock; the target day is always an argument.
//!
//! # Example
//!
//! ```rust
//! use carelink_recurrence::{is_visible, OneTimeMatch, Resolver};
//! # use carelink_core::{CareTask, NaiveDate, Weekday};
//! # let task: CareTask = serde_json::from_value(serde_json::json!({
//! #     "id": "t1", "household_id": "h1", "title": "Dentist", "time": "10:00",
//! #     "recurrence": "one_time", "one_time_date": "2024-05-08",
//! #     "created_at": "2024-05-01T00:00:00Z", "updated_at": "2024-05-01T00:00:00Z"
//! # })).unwrap();
//! let next_week = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
//!
//! // One-time tasks stay visible on their weekday by default.
//! assert!(is_visible(&task, next_week, Weekday::Wed));
//!
//! // The literal-date reading is available explicitly.
//! let exact = Resolver::new(OneTimeMatch::ExactDate);
//! assert!(!exact.is_visible(&task, next_week, Weekday::Wed));
//! ```

#![no_std]

extern crate alloc;

pub mod removal;
pub mod resolver;

pub use removal::{plan_day_removal, DayRemoval};
pub use resolver::{is_visible, OneTimeMatch, Resolver};
