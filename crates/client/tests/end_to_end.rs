//! End-to-end tests: live collections, the write path and the in-memory
//! backend wired together through a `Connection`.

use carelink_client::dashboard::{mount_alerts, mount_completions, mount_journal, mount_tasks};
use carelink_client::{ClientConfig, Connection, Dashboard, LiveCollection, Mutations};
use carelink_core::{
    Alert, CompletionStatus, DateTime, DayScope, EntityId, Error, HouseholdId, JournalDraft, NaiveDate, Recurrence,
    TaskCompletion, TaskDraft, Utc, Weekday,
};
use carelink_reconcile::Newest;
use carelink_realtime::{Direction, MemoryBackend, RemoteStore, SnapshotRequest};
use carelink_recurrence::OneTimeMatch;
use futures::executor::block_on;
use serde_json::json;
use std::collections::HashSet;
use std::rc::Rc;

fn connect(backend: &MemoryBackend) -> Connection {
    connect_with(backend, ClientConfig::default())
}

fn connect_with(backend: &MemoryBackend, config: ClientConfig) -> Connection {
    Connection::from_backend(Rc::new(backend.clone()), config)
}

fn household() -> HouseholdId {
    HouseholdId::from("h1")
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
}

fn wednesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()
}

fn mon_wed() -> Recurrence {
    Recurrence::SpecificDays([Weekday::Mon, Weekday::Wed].into_iter().collect())
}

#[test]
fn test_day_removal_across_scopes() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    let mutations = Mutations::new(&connection);

    let mon = block_on(mount_tasks(&connection, &household(), DayScope::for_date(monday())));
    let wed = block_on(mount_tasks(&connection, &household(), DayScope::for_date(wednesday())));

    let task = block_on(mutations.create_task(&TaskDraft::new(household(), "Insulin", "08:00", &mon_wed()))).unwrap();
    assert_eq!(mon.len(), 1);
    assert_eq!(wed.len(), 1);

    // "Remove for today" on Monday narrows the recurrence.
    let narrowed = block_on(mutations.remove_task_for_day(&task, Weekday::Mon)).unwrap();
    assert!(mon.is_empty());
    assert_eq!(wed.len(), 1);
    assert_eq!(wed.items()[0].recurrence, narrowed.recurrence);
    assert!(wed.items()[0].active);

    // Removing the last remaining day soft-deletes the task everywhere.
    block_on(mutations.remove_task_for_day(&narrowed, Weekday::Wed)).unwrap();
    assert!(wed.is_empty());
    let row = backend.row("care_tasks", task.id.as_str()).unwrap();
    assert_eq!(row["active"], json!(false));

    let fresh_wed = block_on(mount_tasks(&connection, &household(), DayScope::for_date(wednesday())));
    assert!(fresh_wed.is_empty());
}

#[test]
fn test_tasks_sorted_by_time_as_they_arrive() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    let mutations = Mutations::new(&connection);
    let today = block_on(mount_tasks(&connection, &household(), DayScope::for_date(monday())));

    for (title, time) in [("Dinner", "18:00"), ("Breakfast", "07:30"), ("Lunch", "12:00")] {
        block_on(mutations.create_task(&TaskDraft::new(household(), title, time, &Recurrence::Daily))).unwrap();
    }

    let titles: Vec<String> = today.items().into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["Breakfast", "Lunch", "Dinner"]);
}

#[test]
fn test_one_time_task_matching_is_configurable() {
    let backend = MemoryBackend::new();
    let once = Recurrence::OneTime(monday());
    block_on(Mutations::new(&connect(&backend)).create_task(&TaskDraft::new(household(), "Dentist", "14:00", &once)))
        .unwrap();

    let next_monday = DayScope::for_date(NaiveDate::from_ymd_opt(2024, 5, 13).unwrap());

    let weekly = block_on(mount_tasks(&connect(&backend), &household(), next_monday));
    assert_eq!(weekly.len(), 1);

    let exact = ClientConfig {
        one_time_match: OneTimeMatch::ExactDate,
        ..ClientConfig::default()
    };
    let literal = block_on(mount_tasks(&connect_with(&backend, exact.clone()), &household(), next_monday));
    assert!(literal.is_empty());
    let on_the_day = block_on(mount_tasks(&connect_with(&backend, exact), &household(), DayScope::for_date(monday())));
    assert_eq!(on_the_day.len(), 1);
}

#[test]
fn test_completion_is_idempotent_and_undoable() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    let mutations = Mutations::new(&connection);
    let completions = block_on(mount_completions(&connection, &household(), monday()));
    let task_id = EntityId::from("t1");

    block_on(mutations.complete_task(&household(), &task_id, monday())).unwrap();
    block_on(mutations.complete_task(&household(), &task_id, monday())).unwrap();
    assert_eq!(completions.len(), 1);

    let skipped = block_on(mutations.skip_task(&household(), &task_id, monday())).unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions.items()[0].status, CompletionStatus::Skipped);

    // Another day's completion doesn't enter this scope.
    block_on(mutations.complete_task(&household(), &task_id, wednesday())).unwrap();
    assert_eq!(completions.len(), 1);

    block_on(mutations.undo_completion(&skipped.id)).unwrap();
    assert!(completions.is_empty());
}

#[test]
fn test_optimistic_completion_is_overwritten_by_event() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    let completions = block_on(mount_completions(&connection, &household(), monday()));

    let local: TaskCompletion = serde_json::from_value(json!({
        "id": "c-local", "household_id": "h1", "task_id": "t1", "date": "2024-05-06",
        "completed_by": "typed offline",
        "created_at": "2030-01-01T00:00:00Z", "updated_at": "2030-01-01T00:00:00Z"
    }))
    .unwrap();
    let row = json!({
        "id": "c-local", "household_id": "h1", "task_id": "t1", "date": "2024-05-06", "status": "completed"
    });
    let write = connection
        .store()
        .upsert("task_completions", row, TaskCompletion::CONFLICT_KEY);

    block_on(completions.optimistic(local, write)).unwrap();

    let id = EntityId::from("c-local");
    assert!(!completions.is_provisional(&id));
    let confirmed = completions.get(&id).unwrap();
    assert_eq!(confirmed.completed_by, None);
    let local_stamp = "2030-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
    assert!(confirmed.updated_at < local_stamp);
}

#[test]
fn test_stale_snapshot_is_discarded() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    backend.put_row("alerts", json!({"id": "a1", "household_id": "h1", "kind": "fall", "message": "m"}));
    let request = SnapshotRequest::household(household()).order_by("created_at", Direction::Desc);
    let live = LiveCollection::<Alert, _>::open(&connection, request, Newest);

    backend.pause_selects();
    block_on(async {
        let older = live.refetch();
        futures::pin_mut!(older);
        assert!(futures::poll!(older.as_mut()).is_pending());

        backend.put_row("alerts", json!({"id": "a2", "household_id": "h1", "kind": "fall", "message": "m"}));

        let newer = live.refetch();
        futures::pin_mut!(newer);
        assert!(futures::poll!(newer.as_mut()).is_pending());

        backend.release_selects();

        older.await.unwrap();
        assert!(live.is_empty());
        assert!(live.is_loading());

        newer.await.unwrap();
    });

    assert_eq!(live.len(), 2);
    assert!(!live.is_loading());
}

#[test]
fn test_dropped_channel_surfaces_error_and_reconnect_resyncs() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    let alerts = block_on(mount_alerts(&connection, &household()));

    backend.disconnect("socket closed");
    assert!(matches!(alerts.last_error(), Some(Error::Subscription { .. })));
    assert!(alerts.needs_resync());

    // Missed while the connection was down.
    block_on(backend.insert("alerts", json!({"household_id": "h1", "kind": "wander", "message": "left home"})))
        .unwrap();
    assert!(alerts.is_empty());

    backend.reconnect();
    assert!(alerts.needs_resync());

    block_on(alerts.reconnect()).unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts.last_error().is_none());
    assert!(!alerts.needs_resync());

    block_on(backend.insert("alerts", json!({"household_id": "h1", "kind": "fall", "message": "m"}))).unwrap();
    assert_eq!(alerts.len(), 2);
}

#[test]
fn test_server_closed_channels_are_replaced_on_reconnect() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    let mutations = Mutations::new(&connection);
    let dashboard = block_on(Dashboard::mount(&connection, household(), monday()));
    let before: HashSet<String> = backend.open_channels().into_iter().collect();
    assert_eq!(before.len(), 4);

    backend.close_channels();
    assert!(dashboard.needs_resync());
    assert!(matches!(dashboard.last_error(), Some(Error::Subscription { .. })));

    // Refetching alone leaves the collections without a channel.
    block_on(dashboard.refetch()).unwrap();
    assert!(dashboard.needs_resync());
    block_on(mutations.create_task(&TaskDraft::new(household(), "Pill", "08:00", &Recurrence::Daily))).unwrap();
    assert!(dashboard.tasks().is_empty());

    block_on(dashboard.reconnect()).unwrap();
    let after: HashSet<String> = backend.open_channels().into_iter().collect();
    assert_eq!(after.len(), 4);
    assert!(before.is_disjoint(&after));
    assert_eq!(dashboard.tasks().len(), 1);
    assert!(!dashboard.needs_resync());
    assert!(dashboard.last_error().is_none());

    block_on(mutations.create_task(&TaskDraft::new(household(), "Walk", "10:00", &mon_wed()))).unwrap();
    assert_eq!(dashboard.tasks().len(), 2);
}

#[test]
fn test_snapshot_failure_is_reported_and_recovered() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    backend.put_row("alerts", json!({"id": "a1", "household_id": "h1", "kind": "fall", "message": "m"}));
    backend.fail_next_select("statement timeout");

    let alerts = block_on(mount_alerts(&connection, &household()));
    assert!(alerts.is_empty());
    assert_eq!(alerts.last_error(), Some(Error::fetch("alerts", "statement timeout")));

    block_on(alerts.refetch()).unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts.last_error().is_none());
}

#[test]
fn test_journal_pagination() {
    let backend = MemoryBackend::new();
    for i in 0..45 {
        backend.put_row(
            "journal_entries",
            json!({"id": format!("j{:02}", i), "household_id": "h1", "content": format!("entry {}", i)}),
        );
    }
    let connection = connect(&backend);
    let journal = block_on(mount_journal(&connection, &household()));

    assert_eq!(journal.len(), 20);
    assert!(journal.has_more());
    assert_eq!(journal.items()[0].id.as_str(), "j44");

    // A new entry shifts the remaining pages by one.
    let draft = JournalDraft {
        household_id: household(),
        author: Some("sam".into()),
        content: "Slept well".into(),
    };
    let added = block_on(Mutations::new(&connection).add_journal_entry(&draft)).unwrap();
    assert_eq!(journal.items()[0].id, added.id);

    while journal.has_more() {
        block_on(journal.load_more()).unwrap();
    }

    let items = journal.items();
    let ids: HashSet<_> = items.iter().map(|e| e.id.clone()).collect();
    assert_eq!(items.len(), 46);
    assert_eq!(ids.len(), 46);
    assert!(items.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    block_on(journal.load_more()).unwrap();
    assert_eq!(journal.len(), 46);
}

#[test]
fn test_dashboard_flow_and_teardown() {
    let backend = MemoryBackend::new();
    backend.put_row(
        "safe_zones",
        json!({"id": "z1", "household_id": "h1", "name": "Home", "latitude": 51.5, "longitude": -0.12, "radius_m": 150.0, "active": true}),
    );
    backend.put_row(
        "alerts",
        json!({"id": "a1", "household_id": "h1", "kind": "fall", "message": "Possible fall"}),
    );
    let connection = connect(&backend);
    let mutations = Mutations::new(&connection);

    let dashboard = block_on(Dashboard::mount(&connection, household(), monday()));
    assert_eq!(backend.open_channels().len(), 4);
    assert_eq!(dashboard.zones().len(), 1);
    assert_eq!(dashboard.unacknowledged_alerts().len(), 1);

    let pill = block_on(mutations.create_task(&TaskDraft::new(household(), "Pill", "08:00", &Recurrence::Daily))).unwrap();
    block_on(mutations.create_task(&TaskDraft::new(household(), "Walk", "10:00", &mon_wed()))).unwrap();
    block_on(mutations.complete_task(&household(), &pill.id, monday())).unwrap();

    let today = dashboard.today();
    assert_eq!(today.items.len(), 2);
    assert_eq!(today.items[0].status, Some(CompletionStatus::Completed));
    assert_eq!(today.pending(), 1);

    block_on(mutations.acknowledge_alert(&EntityId::from("a1"), "sam")).unwrap();
    assert!(dashboard.unacknowledged_alerts().is_empty());

    block_on(mutations.deactivate_safe_zone(&EntityId::from("z1"))).unwrap();
    assert!(dashboard.zones().is_empty());

    assert!(block_on(dashboard.check_in()).unwrap().is_none());
    assert!(dashboard.last_error().is_none());

    dashboard.teardown();
    assert!(backend.open_channels().is_empty());

    // Nothing reaches a torn-down dashboard.
    block_on(mutations.create_task(&TaskDraft::new(household(), "Late", "20:00", &Recurrence::Daily))).unwrap();
    assert_eq!(dashboard.tasks().len(), 2);
}

#[test]
fn test_households_are_isolated() {
    let backend = MemoryBackend::new();
    let connection = connect(&backend);
    let mutations = Mutations::new(&connection);
    let mine = block_on(mount_tasks(&connection, &household(), DayScope::for_date(monday())));
    let theirs = block_on(mount_tasks(&connection, &HouseholdId::from("h2"), DayScope::for_date(monday())));

    block_on(mutations.create_task(&TaskDraft::new(HouseholdId::from("h2"), "Other", "09:00", &Recurrence::Daily)))
        .unwrap();

    assert!(mine.is_empty());
    assert_eq!(theirs.len(), 1);
}
