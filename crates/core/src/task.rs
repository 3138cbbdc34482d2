//! Care tasks and their recurrence policy.
//!
//! On the wire a task carries three flat columns (`recurrence`,
//! `recurrence_days`, `one_time_date`) of which only the one selected by
//! `recurrence` is meaningful. `Recurrence` folds them into a single enum so
//! the unused columns can't be read by accident.

use crate::calendar::WeekdaySet;
use crate::entity::{impl_entity, EntityId, HouseholdId};
use crate::error::Error;
use alloc::string::String;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use core::cmp::Ordering;
use serde::{Deserialize, Serialize};

/// Discriminant of the `recurrence` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    SpecificDays,
    OneTime,
}

/// Which days a task applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recurrence {
    /// Every day.
    Daily,
    /// Only on the listed weekdays.
    SpecificDays(WeekdaySet),
    /// Scheduled once, on this date.
    OneTime(NaiveDate),
}

impl Recurrence {
    /// Returns the column discriminant.
    pub fn kind(&self) -> RecurrenceKind {
        match self {
            Recurrence::Daily => RecurrenceKind::Daily,
            Recurrence::SpecificDays(_) => RecurrenceKind::SpecificDays,
            Recurrence::OneTime(_) => RecurrenceKind::OneTime,
        }
    }

    /// Returns the flat column form, with the unused columns cleared.
    pub fn columns(&self) -> RecurrenceColumns {
        match self {
            Recurrence::Daily => RecurrenceColumns {
                recurrence: RecurrenceKind::Daily,
                recurrence_days: None,
                one_time_date: None,
            },
            Recurrence::SpecificDays(days) => RecurrenceColumns {
                recurrence: RecurrenceKind::SpecificDays,
                recurrence_days: Some(*days),
                one_time_date: None,
            },
            Recurrence::OneTime(date) => RecurrenceColumns {
                recurrence: RecurrenceKind::OneTime,
                recurrence_days: None,
                one_time_date: Some(*date),
            },
        }
    }

    /// Rebuilds a recurrence from its flat columns.
    ///
    /// A missing discriminant is read as `Daily`; `specific_days` without a
    /// day list is an empty set; `one_time` without a date is rejected.
    pub fn from_columns(
        kind: Option<RecurrenceKind>,
        days: Option<WeekdaySet>,
        date: Option<NaiveDate>,
    ) -> crate::Result<Self> {
        match kind.unwrap_or(RecurrenceKind::Daily) {
            RecurrenceKind::Daily => Ok(Recurrence::Daily),
            RecurrenceKind::SpecificDays => Ok(Recurrence::SpecificDays(days.unwrap_or_default())),
            RecurrenceKind::OneTime => date
                .map(Recurrence::OneTime)
                .ok_or_else(|| Error::invalid_record("one_time task without one_time_date")),
        }
    }
}

/// Flat column form of a recurrence, as written to the remote store.
///
/// Unused columns serialize as `null` so an edit that changes the policy
/// also clears the stale column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecurrenceColumns {
    pub recurrence: RecurrenceKind,
    pub recurrence_days: Option<WeekdaySet>,
    pub one_time_date: Option<NaiveDate>,
}

/// A recurring (or one-off) care task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskRow", into = "TaskRow")]
pub struct CareTask {
    pub id: EntityId,
    pub household_id: HouseholdId,
    pub title: String,
    pub category: Option<String>,
    /// Time of day as entered, `HH:MM` or `HH:MM:SS`.
    pub time: String,
    pub notes: Option<String>,
    /// Soft-delete flag.
    pub active: bool,
    pub recurrence: Recurrence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(CareTask, "care_tasks");

impl CareTask {
    /// Parses `time` into a time of day, if it is well formed.
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        parse_time_of_day(&self.time)
    }

    /// Orders tasks by time of day, then by the raw time string, then by id.
    ///
    /// Unparseable times sort after every parseable one.
    pub fn cmp_schedule(&self, other: &Self) -> Ordering {
        match (self.time_of_day(), other.time_of_day()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.time.cmp(&other.time))
        .then_with(|| self.id.cmp(&other.id))
    }
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let mut parts = raw.trim().split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let second: u32 = match parts.next() {
        // Postgres `time` columns may carry fractional seconds.
        Some(s) => s.split('.').next()?.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

#[derive(Serialize, Deserialize)]
struct TaskRow {
    id: EntityId,
    household_id: HouseholdId,
    title: String,
    #[serde(default)]
    category: Option<String>,
    time: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    recurrence: Option<RecurrenceKind>,
    #[serde(default)]
    recurrence_days: Option<WeekdaySet>,
    #[serde(default)]
    one_time_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl TryFrom<TaskRow> for CareTask {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let recurrence =
            Recurrence::from_columns(row.recurrence, row.recurrence_days, row.one_time_date)?;
        Ok(CareTask {
            id: row.id,
            household_id: row.household_id,
            title: row.title,
            category: row.category,
            time: row.time,
            notes: row.notes,
            active: row.active,
            recurrence,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<CareTask> for TaskRow {
    fn from(task: CareTask) -> Self {
        let columns = task.recurrence.columns();
        TaskRow {
            id: task.id,
            household_id: task.household_id,
            title: task.title,
            category: task.category,
            time: task.time,
            notes: task.notes,
            active: task.active,
            recurrence: Some(columns.recurrence),
            recurrence_days: columns.recurrence_days,
            one_time_date: columns.one_time_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Insert payload for a new task. The store assigns id and timestamps.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskDraft {
    pub household_id: HouseholdId,
    pub title: String,
    pub category: Option<String>,
    pub time: String,
    pub notes: Option<String>,
    pub active: bool,
    #[serde(flatten)]
    pub recurrence: RecurrenceColumns,
}

impl TaskDraft {
    /// Creates an active task draft.
    pub fn new(
        household_id: HouseholdId,
        title: impl Into<String>,
        time: impl Into<String>,
        recurrence: &Recurrence,
    ) -> Self {
        Self {
            household_id,
            title: title.into(),
            category: None,
            time: time.into(),
            notes: None,
            active: true,
            recurrence: recurrence.columns(),
        }
    }

    /// Sets the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets free-form notes.
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
