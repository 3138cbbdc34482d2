//! The write path.
//!
//! Every write goes to the remote store and returns the row as stored. Local
//! collections are not touched here; they pick the change up from their
//! channel. Use [`LiveCollection::optimistic`](crate::LiveCollection::optimistic)
//! to show a write before it is confirmed.

use crate::connection::Connection;
use carelink_core::{
    decode_row, Alert, CareTask, CheckIn, CheckInDraft, CompletionDraft, CompletionStatus, Entity, EntityId, Error,
    HouseholdId, JournalDraft, JournalEntry, NaiveDate, Result, SafeZone, TaskCompletion, TaskDraft, Weekday,
};
use carelink_recurrence::{plan_day_removal, DayRemoval};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Writes against one connection.
#[derive(Clone, Debug)]
pub struct Mutations {
    connection: Connection,
}

impl Mutations {
    pub fn new(connection: &Connection) -> Self {
        Self {
            connection: connection.clone(),
        }
    }

    /// Inserts a new care task.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<CareTask> {
        let row = to_row::<CareTask, _>(draft)?;
        let task: CareTask = self.insert(row).await?;
        info!(id = %task.id, household = %task.household_id, "task created");
        Ok(task)
    }

    /// Writes every field of an edited task.
    pub async fn update_task(&self, task: &CareTask) -> Result<CareTask> {
        let row = to_row::<CareTask, _>(task)?;
        self.update(&task.id, row).await
    }

    /// Sets `active = false`. The task disappears from every day.
    pub async fn soft_delete_task(&self, id: &EntityId) -> Result<CareTask> {
        let task: CareTask = self.update(id, json!({ "active": false })).await?;
        info!(%id, "task deactivated");
        Ok(task)
    }

    /// Removes a task from one weekday only.
    ///
    /// The recurrence is narrowed to exclude `weekday`; if no day would be
    /// left the task is soft-deleted instead. A task that doesn't apply to
    /// `weekday` is returned unchanged without a write.
    pub async fn remove_task_for_day(&self, task: &CareTask, weekday: Weekday) -> Result<CareTask> {
        match plan_day_removal(task, weekday) {
            DayRemoval::Narrow(recurrence) => {
                debug!(id = %task.id, ?weekday, ?recurrence, "narrowing task recurrence");
                let row = to_row::<CareTask, _>(&recurrence.columns())?;
                self.update(&task.id, row).await
            }
            DayRemoval::Deactivate => {
                debug!(id = %task.id, ?weekday, "last day removed, deactivating task");
                self.soft_delete_task(&task.id).await
            }
            DayRemoval::Unchanged => {
                debug!(id = %task.id, ?weekday, "task not scheduled on that day");
                Ok(task.clone())
            }
        }
    }

    /// Marks a task done for a day. Repeating it keeps a single record.
    pub async fn complete_task(&self, household: &HouseholdId, task_id: &EntityId, date: NaiveDate) -> Result<TaskCompletion> {
        let draft = CompletionDraft::new(household.clone(), task_id.clone(), date, CompletionStatus::Completed);
        self.record_completion(&draft).await
    }

    /// Marks a task skipped for a day, replacing any completion.
    pub async fn skip_task(&self, household: &HouseholdId, task_id: &EntityId, date: NaiveDate) -> Result<TaskCompletion> {
        let draft = CompletionDraft::new(household.clone(), task_id.clone(), date, CompletionStatus::Skipped);
        self.record_completion(&draft).await
    }

    /// Upserts a completion on its (task, date) key.
    pub async fn record_completion(&self, draft: &CompletionDraft) -> Result<TaskCompletion> {
        let row = to_row::<TaskCompletion, _>(draft)?;
        let completion: TaskCompletion = self.upsert(row, TaskCompletion::CONFLICT_KEY).await?;
        info!(task = %completion.task_id, date = %completion.date, status = ?completion.status, "completion recorded");
        Ok(completion)
    }

    /// Deletes a completion record, returning the task to pending.
    pub async fn undo_completion(&self, completion_id: &EntityId) -> Result<()> {
        self.connection
            .store()
            .delete(TaskCompletion::TABLE, completion_id)
            .await
            .map_err(|e| write_error(TaskCompletion::TABLE, e))?;
        info!(id = %completion_id, "completion undone");
        Ok(())
    }

    pub async fn acknowledge_alert(&self, id: &EntityId, by: &str) -> Result<Alert> {
        self.update(id, json!({ "acknowledged": true, "acknowledged_by": by })).await
    }

    /// Soft-deletes a safe zone.
    pub async fn deactivate_safe_zone(&self, id: &EntityId) -> Result<SafeZone> {
        self.update(id, json!({ "active": false })).await
    }

    pub async fn add_journal_entry(&self, draft: &JournalDraft) -> Result<JournalEntry> {
        let row = to_row::<JournalEntry, _>(draft)?;
        self.insert(row).await
    }

    /// Upserts today's check-in on its (household, date) key.
    pub async fn record_check_in(&self, draft: &CheckInDraft) -> Result<CheckIn> {
        let row = to_row::<CheckIn, _>(draft)?;
        self.upsert(row, CheckIn::CONFLICT_KEY).await
    }

    async fn insert<E: Entity>(&self, row: Value) -> Result<E> {
        let stored = self
            .connection
            .store()
            .insert(E::TABLE, row)
            .await
            .map_err(|e| write_error(E::TABLE, e))?;
        decode_row(&stored)
    }

    async fn update<E: Entity>(&self, id: &EntityId, patch: Value) -> Result<E> {
        let stored = self
            .connection
            .store()
            .update(E::TABLE, id, patch)
            .await
            .map_err(|e| write_error(E::TABLE, e))?;
        decode_row(&stored)
    }

    async fn upsert<E: Entity>(&self, row: Value, on_conflict: &str) -> Result<E> {
        let stored = self
            .connection
            .store()
            .upsert(E::TABLE, row, on_conflict)
            .await
            .map_err(|e| write_error(E::TABLE, e))?;
        decode_row(&stored)
    }
}

fn to_row<E: Entity, T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::mutation(E::TABLE, e.to_string()))
}

/// Normalises a store failure into a mutation error for `table`.
fn write_error(table: &str, err: Error) -> Error {
    warn!(table, error = %err, "write failed");
    match err {
        Error::Mutation { .. } => err,
        other => Error::mutation(table, other.to_string()),
    }
}
