//! Planning the write that removes a task from a single weekday.
//!
//! "Remove from today only" never deletes the row. It narrows the task's
//! recurrence so the weekday is excluded, and only when nothing would be left
//! does it fall back to a soft delete. The reconciliation side then reacts to
//! the resulting UPDATE like any other.

use carelink_core::{CareTask, Recurrence, Weekday, WeekdaySet};
use chrono::Datelike;

/// The write needed to drop a task from one weekday.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DayRemoval {
    /// Replace the task's recurrence with this narrower one.
    Narrow(Recurrence),
    /// No day would remain; set `active = false`.
    Deactivate,
    /// The task doesn't apply to that weekday; nothing to write.
    Unchanged,
}

/// Plans the removal of `task` from `weekday`.
pub fn plan_day_removal(task: &CareTask, weekday: Weekday) -> DayRemoval {
    if !task.active {
        return DayRemoval::Unchanged;
    }
    match &task.recurrence {
        Recurrence::Daily => DayRemoval::Narrow(Recurrence::SpecificDays(WeekdaySet::all().without(weekday))),
        Recurrence::SpecificDays(days) => {
            if !days.contains(weekday) {
                DayRemoval::Unchanged
            } else {
                let rest = days.without(weekday);
                if rest.is_empty() {
                    DayRemoval::Deactivate
                } else {
                    DayRemoval::Narrow(Recurrence::SpecificDays(rest))
                }
            }
        }
        Recurrence::OneTime(date) => {
            if date.weekday() == weekday {
                DayRemoval::Deactivate
            } else {
                DayRemoval::Unchanged
            }
        }
    }
}
