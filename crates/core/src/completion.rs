//! Per-day task completion records.

use crate::entity::{impl_entity, EntityId, HouseholdId};
use alloc::string::String;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome recorded for a task on a given day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    #[default]
    Completed,
    Skipped,
}

/// Composite key of a completion: at most one record per task per day.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionKey {
    pub task_id: EntityId,
    pub date: NaiveDate,
}

/// A completion or skip of one task on one calendar day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: EntityId,
    pub household_id: HouseholdId,
    pub task_id: EntityId,
    pub date: NaiveDate,
    #[serde(default)]
    pub status: CompletionStatus,
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(TaskCompletion, "task_completions");

impl TaskCompletion {
    /// Conflict target for upserts.
    pub const CONFLICT_KEY: &'static str = "task_id,date";

    /// Returns the composite key of this record.
    pub fn key(&self) -> CompletionKey {
        CompletionKey {
            task_id: self.task_id.clone(),
            date: self.date,
        }
    }
}

/// Upsert payload for a completion.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionDraft {
    pub household_id: HouseholdId,
    pub task_id: EntityId,
    pub date: NaiveDate,
    pub status: CompletionStatus,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CompletionDraft {
    /// Creates a draft for the given task and day.
    pub fn new(
        household_id: HouseholdId,
        task_id: EntityId,
        date: NaiveDate,
        status: CompletionStatus,
    ) -> Self {
        Self {
            household_id,
            task_id,
            date,
            status,
            completed_by: None,
            completed_at: None,
        }
    }

    /// Records who marked the task and when.
    pub fn by(mut self, who: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.completed_by = Some(who.into());
        self.completed_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_defaults_to_completed() {
        let completion: TaskCompletion = serde_json::from_value(json!({
            "id": "c1",
            "household_id": "h1",
            "task_id": "t1",
            "date": "2024-05-06",
            "created_at": "2024-05-06T08:00:00Z",
            "updated_at": "2024-05-06T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(completion.status, CompletionStatus::Completed);
        assert_eq!(
            completion.key(),
            CompletionKey {
                task_id: EntityId::from("t1"),
                date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            }
        );
    }

    #[test]
    fn test_draft_serializes_status() {
        let draft = CompletionDraft::new(
            HouseholdId::from("h1"),
            EntityId::from("t1"),
            NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            CompletionStatus::Skipped,
        );
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["date"], "2024-05-06");
    }
}
