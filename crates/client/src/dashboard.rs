//! The household dashboard: today's tasks with their completions, open
//! alerts, and safe zones, each on its own channel.

use crate::connection::Connection;
use crate::live::LiveCollection;
use crate::paged::PagedCollection;
use carelink_core::{
    Alert, CareTask, CheckIn, CompletionStatus, DayScope, EntityId, Error, HouseholdId, JournalEntry, NaiveDate,
    Result, SafeZone, TaskCompletion,
};
use carelink_reconcile::{ActiveZones, CompletionDay, Newest, TaskDay};
use carelink_realtime::{snapshot, Direction, SnapshotRequest};
use hashbrown::HashMap;
use tracing::debug;

/// Active tasks visible on `scope`, ordered by time of day.
pub async fn mount_tasks(
    connection: &Connection,
    household: &HouseholdId,
    scope: DayScope,
) -> LiveCollection<CareTask, TaskDay> {
    let request = SnapshotRequest::household(household.clone()).order_by("time", Direction::Asc);
    let membership = TaskDay::with_one_time_match(scope, connection.config().one_time_match);
    LiveCollection::mount(connection, request, membership).await
}

/// Completion records for one date.
pub async fn mount_completions(
    connection: &Connection,
    household: &HouseholdId,
    date: NaiveDate,
) -> LiveCollection<TaskCompletion, CompletionDay> {
    let request = SnapshotRequest::household(household.clone()).eq("date", date.to_string());
    LiveCollection::mount(connection, request, CompletionDay::new(date)).await
}

/// Alerts, newest first.
pub async fn mount_alerts(connection: &Connection, household: &HouseholdId) -> LiveCollection<Alert, Newest> {
    let request = SnapshotRequest::household(household.clone()).order_by("created_at", Direction::Desc);
    LiveCollection::mount(connection, request, Newest).await
}

/// Safe zones that are still active.
pub async fn mount_safe_zones(connection: &Connection, household: &HouseholdId) -> LiveCollection<SafeZone, ActiveZones> {
    let request = SnapshotRequest::household(household.clone())
        .eq("active", "true")
        .order_by("name", Direction::Asc);
    LiveCollection::mount(connection, request, ActiveZones).await
}

/// The journal, newest first, one page at a time.
pub async fn mount_journal(connection: &Connection, household: &HouseholdId) -> PagedCollection<JournalEntry> {
    let request = SnapshotRequest::household(household.clone()).order_by("created_at", Direction::Desc);
    PagedCollection::mount(connection, request).await
}

/// A task with its completion state for the day.
#[derive(Clone, Debug, PartialEq)]
pub struct TodayItem {
    pub task: CareTask,
    /// `None` while the task is still pending.
    pub status: Option<CompletionStatus>,
    pub completion_id: Option<EntityId>,
}

/// Today's tasks joined with today's completions.
#[derive(Clone, Debug, PartialEq)]
pub struct TodayView {
    pub date: NaiveDate,
    pub items: Vec<TodayItem>,
}

impl TodayView {
    /// Joins tasks with completions for `date`, keeping task order.
    /// Completions for other dates or unknown tasks are ignored.
    pub fn build(date: NaiveDate, tasks: &[CareTask], completions: &[TaskCompletion]) -> Self {
        let by_task: HashMap<&EntityId, &TaskCompletion> = completions
            .iter()
            .filter(|c| c.date == date)
            .map(|c| (&c.task_id, c))
            .collect();
        let items = tasks
            .iter()
            .map(|task| {
                let completion = by_task.get(&task.id);
                TodayItem {
                    task: task.clone(),
                    status: completion.map(|c| c.status),
                    completion_id: completion.map(|c| c.id.clone()),
                }
            })
            .collect();
        Self { date, items }
    }

    /// Number of tasks neither completed nor skipped.
    pub fn pending(&self) -> usize {
        self.items.iter().filter(|i| i.status.is_none()).count()
    }

    pub fn completed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == Some(CompletionStatus::Completed))
            .count()
    }

    /// True when every task has been completed or skipped.
    pub fn is_done(&self) -> bool {
        self.pending() == 0
    }
}

/// Everything the caregiver home screen shows for one household and day.
pub struct Dashboard {
    connection: Connection,
    household: HouseholdId,
    scope: DayScope,
    tasks: LiveCollection<CareTask, TaskDay>,
    completions: LiveCollection<TaskCompletion, CompletionDay>,
    alerts: LiveCollection<Alert, Newest>,
    zones: LiveCollection<SafeZone, ActiveZones>,
}

impl Dashboard {
    /// Mounts every collection, loading their snapshots concurrently.
    pub async fn mount(connection: &Connection, household: HouseholdId, date: NaiveDate) -> Self {
        let scope = DayScope::for_date(date);
        let (tasks, completions, alerts, zones) = futures::join!(
            mount_tasks(connection, &household, scope),
            mount_completions(connection, &household, date),
            mount_alerts(connection, &household),
            mount_safe_zones(connection, &household),
        );
        debug!(%household, %date, "dashboard mounted");
        Self {
            connection: connection.clone(),
            household,
            scope,
            tasks,
            completions,
            alerts,
            zones,
        }
    }

    #[inline]
    pub fn household(&self) -> &HouseholdId {
        &self.household
    }

    #[inline]
    pub fn scope(&self) -> DayScope {
        self.scope
    }

    pub fn tasks(&self) -> &LiveCollection<CareTask, TaskDay> {
        &self.tasks
    }

    pub fn completions(&self) -> &LiveCollection<TaskCompletion, CompletionDay> {
        &self.completions
    }

    pub fn alerts(&self) -> &LiveCollection<Alert, Newest> {
        &self.alerts
    }

    pub fn zones(&self) -> &LiveCollection<SafeZone, ActiveZones> {
        &self.zones
    }

    /// Today's tasks with their completion state.
    pub fn today(&self) -> TodayView {
        self.tasks.with_items(|tasks| {
            self.completions
                .with_items(|completions| TodayView::build(self.scope.date, tasks, completions))
        })
    }

    pub fn unacknowledged_alerts(&self) -> Vec<Alert> {
        self.alerts
            .with_items(|alerts| alerts.iter().filter(|a| !a.acknowledged).cloned().collect())
    }

    /// Loads today's check-in, if one was recorded.
    pub async fn check_in(&self) -> Result<Option<CheckIn>> {
        let request = SnapshotRequest::household(self.household.clone()).eq("date", self.scope.date.to_string());
        snapshot::load_single::<CheckIn>(self.connection.store(), &request).await
    }

    /// True if any collection may have missed events.
    pub fn needs_resync(&self) -> bool {
        self.tasks.needs_resync()
            || self.completions.needs_resync()
            || self.alerts.needs_resync()
            || self.zones.needs_resync()
    }

    /// The first error among the collections.
    pub fn last_error(&self) -> Option<Error> {
        self.tasks
            .last_error()
            .or_else(|| self.completions.last_error())
            .or_else(|| self.alerts.last_error())
            .or_else(|| self.zones.last_error())
    }

    /// Reloads every collection.
    pub async fn refetch(&self) -> Result<()> {
        futures::try_join!(
            self.tasks.refetch(),
            self.completions.refetch(),
            self.alerts.refetch(),
            self.zones.refetch(),
        )?;
        Ok(())
    }

    /// Reopens failed channels and reloads every collection.
    pub async fn reconnect(&self) -> Result<()> {
        futures::try_join!(
            self.tasks.reconnect(),
            self.completions.reconnect(),
            self.alerts.reconnect(),
            self.zones.reconnect(),
        )?;
        Ok(())
    }

    /// Closes every channel.
    pub fn teardown(&self) {
        self.tasks.teardown();
        self.completions.teardown();
        self.alerts.teardown();
        self.zones.teardown();
    }
}
