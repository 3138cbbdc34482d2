//! In-process remote store and transport.
//!
//! `MemoryBackend` keeps tables as JSON rows and fans every write out to the
//! channels whose filter matches, the way the hosted service does. It also
//! lets a caller drop and restore the connection, fail the next call, or hold
//! selects until released, so races between snapshots and the change stream
//! can be replayed deterministically.

use crate::query::SelectQuery;
use crate::remote::{
    ChannelFilter, ChannelHandle, ChannelMessage, ChannelSink, ChannelStatus, RealtimeTransport, RemoteStore,
    Row,
};
use async_trait::async_trait;
use carelink_core::{DateTime, EntityId, Error, RawChange, Result, Utc};
use chrono::SecondsFormat;
use futures::channel::oneshot;
use hashbrown::HashMap;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

/// 2024-01-01T00:00:00Z
const DEFAULT_EPOCH: i64 = 1_704_067_200;

struct OpenChannel {
    id: u64,
    name: String,
    table: String,
    filter: ChannelFilter,
    sink: ChannelSink,
}

#[derive(Default)]
struct Faults {
    select: Option<String>,
    write: Option<String>,
    open: Option<String>,
}

struct State {
    tables: HashMap<String, Vec<Row>>,
    channels: Vec<OpenChannel>,
    next_channel: u64,
    next_row: u64,
    clock: DateTime<Utc>,
    online: bool,
    faults: Faults,
    paused: bool,
    waiting: Vec<oneshot::Sender<()>>,
}

impl State {
    /// Advances the logical clock and returns the new timestamp.
    fn tick(&mut self) -> String {
        self.clock = self.clock + chrono::Duration::seconds(1);
        self.clock.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn rows_mut(&mut self, table: &str) -> &mut Vec<Row> {
        self.tables.entry(table.to_string()).or_default()
    }

    fn position(&self, table: &str, id: &str) -> Option<usize> {
        self.tables
            .get(table)?
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }

    fn take_write_fault(&mut self, table: &str) -> Result<()> {
        match self.faults.write.take() {
            Some(message) => Err(Error::mutation(table, message)),
            None => Ok(()),
        }
    }

    /// Fills in id and timestamps for a new row.
    fn stamp_new(&mut self, table: &str, mut fields: Map<String, Value>) -> Result<Row> {
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                self.next_row += 1;
                format!("{}-{}", table, self.next_row)
            }
        };
        if self.position(table, &id).is_some() {
            return Err(Error::mutation(table, format!("duplicate key {}", id)));
        }
        let now = self.tick();
        fields.insert("id".into(), Value::String(id));
        fields.entry("created_at").or_insert_with(|| Value::String(now.clone()));
        fields.insert("updated_at".into(), Value::String(now));
        Ok(Value::Object(fields))
    }

    /// Applies a patch to the row at `pos`, returning (old, new).
    fn patch(&mut self, table: &str, pos: usize, patch: Map<String, Value>) -> (Row, Row) {
        let now = self.tick();
        let rows = self.rows_mut(table);
        let old = rows[pos].clone();
        if let Value::Object(fields) = &mut rows[pos] {
            for (key, value) in patch {
                if key != "id" && key != "created_at" {
                    fields.insert(key, value);
                }
            }
            fields.insert("updated_at".into(), Value::String(now));
        }
        (old, rows[pos].clone())
    }

    fn sinks_for(&self, table: &str, image: &Row) -> Vec<ChannelSink> {
        if !self.online {
            return Vec::new();
        }
        self.channels
            .iter()
            .filter(|c| c.table == table && c.filter.matches(image))
            .map(|c| c.sink.clone())
            .collect()
    }

    fn all_sinks(&self) -> Vec<ChannelSink> {
        self.channels.iter().map(|c| c.sink.clone()).collect()
    }
}

/// An in-memory implementation of [`RemoteStore`] and [`RealtimeTransport`].
///
/// Clones share the same tables and channels.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Rc<RefCell<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend whose clock starts at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self::with_clock(DateTime::from_timestamp(DEFAULT_EPOCH, 0).unwrap_or_default())
    }

    /// Creates an empty backend with the given logical clock. Every write
    /// advances the clock by one second.
    pub fn with_clock(start: DateTime<Utc>) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                tables: HashMap::new(),
                channels: Vec::new(),
                next_channel: 0,
                next_row: 0,
                clock: start,
                online: true,
                faults: Faults::default(),
                paused: false,
                waiting: Vec::new(),
            })),
        }
    }

    /// Stores a row without publishing a change, filling in a missing id and
    /// timestamps. Used to set up pre-existing data.
    pub fn put_row(&self, table: &str, mut row: Row) -> Row {
        let mut state = self.state.borrow_mut();
        if let Value::Object(fields) = &mut row {
            if !fields.contains_key("id") {
                state.next_row += 1;
                let id = format!("{}-{}", table, state.next_row);
                fields.insert("id".into(), Value::String(id));
            }
            let now = state.tick();
            fields.entry("created_at").or_insert_with(|| Value::String(now.clone()));
            fields.entry("updated_at").or_insert_with(|| Value::String(now));
        }
        state.rows_mut(table).push(row.clone());
        row
    }

    /// Returns a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state.borrow().tables.get(table).cloned().unwrap_or_default()
    }

    /// Returns one row by id.
    pub fn row(&self, table: &str, id: &str) -> Option<Row> {
        let state = self.state.borrow();
        let pos = state.position(table, id)?;
        state.tables.get(table).map(|rows| rows[pos].clone())
    }

    /// Returns the current logical time.
    pub fn now(&self) -> DateTime<Utc> {
        self.state.borrow().clock
    }

    /// Returns the names of the open channels.
    pub fn open_channels(&self) -> Vec<String> {
        self.state.borrow().channels.iter().map(|c| c.name.clone()).collect()
    }

    /// Delivers a raw change to every channel on its table, bypassing filters.
    pub fn inject(&self, change: RawChange) {
        let sinks: Vec<ChannelSink> = {
            let state = self.state.borrow();
            state
                .channels
                .iter()
                .filter(|c| c.table == change.table)
                .map(|c| c.sink.clone())
                .collect()
        };
        for sink in sinks {
            sink(ChannelMessage::Change(change.clone()));
        }
    }

    /// Drops the connection. Channels are told they failed and miss every
    /// change until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self, reason: &str) {
        let sinks = {
            let mut state = self.state.borrow_mut();
            state.online = false;
            state.all_sinks()
        };
        info!(reason, channels = sinks.len(), "memory transport disconnected");
        for sink in sinks {
            sink(ChannelMessage::Status(ChannelStatus::Failed(reason.to_string())));
        }
    }

    /// Restores the connection and tells every channel it reconnected.
    pub fn reconnect(&self) {
        let sinks = {
            let mut state = self.state.borrow_mut();
            state.online = true;
            state.all_sinks()
        };
        info!(channels = sinks.len(), "memory transport reconnected");
        for sink in sinks {
            sink(ChannelMessage::Status(ChannelStatus::Reconnected));
        }
    }

    /// Closes every channel from the server side. Each is told it was
    /// closed and then receives nothing more.
    pub fn close_channels(&self) {
        let sinks: Vec<ChannelSink> = {
            let mut state = self.state.borrow_mut();
            let sinks = state.all_sinks();
            state.channels.clear();
            sinks
        };
        info!(channels = sinks.len(), "memory transport closed channels");
        for sink in sinks {
            sink(ChannelMessage::Status(ChannelStatus::Closed));
        }
    }

    /// Makes the next select fail with `message`.
    pub fn fail_next_select(&self, message: &str) {
        self.state.borrow_mut().faults.select = Some(message.to_string());
    }

    /// Makes the next insert, update, upsert or delete fail with `message`.
    pub fn fail_next_write(&self, message: &str) {
        self.state.borrow_mut().faults.write = Some(message.to_string());
    }

    /// Makes the next channel open fail with `message`.
    pub fn fail_next_open(&self, message: &str) {
        self.state.borrow_mut().faults.open = Some(message.to_string());
    }

    /// Holds select responses until [`release_selects`](Self::release_selects).
    ///
    /// The rows are read when the select is issued, so a held response is
    /// the snapshot as of the request.
    pub fn pause_selects(&self) {
        self.state.borrow_mut().paused = true;
    }

    /// Releases every held select and stops holding new ones.
    pub fn release_selects(&self) {
        let waiting = {
            let mut state = self.state.borrow_mut();
            state.paused = false;
            std::mem::take(&mut state.waiting)
        };
        for gate in waiting {
            let _ = gate.send(());
        }
    }

    /// Returns the number of held selects.
    pub fn pending_selects(&self) -> usize {
        self.state.borrow().waiting.len()
    }

    fn fan_out(&self, sinks: Vec<ChannelSink>, change: RawChange) {
        for sink in sinks {
            sink(ChannelMessage::Change(change.clone()));
        }
    }
}

fn into_fields(table: &str, row: Row) -> Result<Map<String, Value>> {
    match row {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::mutation(table, format!("expected an object row, got {}", other))),
    }
}

#[async_trait(?Send)]
impl RemoteStore for MemoryBackend {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        let (rows, gate) = {
            let mut state = self.state.borrow_mut();
            if let Some(message) = state.faults.select.take() {
                return Err(Error::fetch(query.table.clone(), message));
            }
            let rows = match state.tables.get(&query.table) {
                Some(table) => query.execute(table),
                None => Vec::new(),
            };
            let gate = if state.paused {
                let (tx, rx) = oneshot::channel();
                state.waiting.push(tx);
                Some(rx)
            } else {
                None
            };
            (rows, gate)
        };
        if let Some(gate) = gate {
            gate.await
                .map_err(|_| Error::fetch(query.table.clone(), "backend dropped held select"))?;
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let (stored, sinks) = {
            let mut state = self.state.borrow_mut();
            state.take_write_fault(table)?;
            let fields = into_fields(table, row)?;
            let stored = state.stamp_new(table, fields)?;
            state.rows_mut(table).push(stored.clone());
            let sinks = state.sinks_for(table, &stored);
            (stored, sinks)
        };
        debug!(table, id = ?stored.get("id"), "insert");
        self.fan_out(sinks, RawChange::insert(table, stored.clone()));
        Ok(stored)
    }

    async fn update(&self, table: &str, id: &EntityId, patch: Row) -> Result<Row> {
        let (old, new, sinks) = {
            let mut state = self.state.borrow_mut();
            state.take_write_fault(table)?;
            let patch = into_fields(table, patch)?;
            let pos = state
                .position(table, id.as_str())
                .ok_or_else(|| Error::mutation(table, format!("no row with id {}", id)))?;
            let (old, new) = state.patch(table, pos, patch);
            let sinks = state.sinks_for(table, &new);
            (old, new, sinks)
        };
        debug!(table, %id, "update");
        self.fan_out(sinks, RawChange::update(table, new.clone(), Some(old)));
        Ok(new)
    }

    async fn upsert(&self, table: &str, row: Row, on_conflict: &str) -> Result<Row> {
        let columns: Vec<&str> = on_conflict.split(',').map(str::trim).filter(|c| !c.is_empty()).collect();
        let (change, stored, sinks) = {
            let mut state = self.state.borrow_mut();
            state.take_write_fault(table)?;
            let fields = into_fields(table, row)?;
            if columns.iter().any(|c| !fields.contains_key(*c)) {
                return Err(Error::mutation(table, format!("row lacks conflict columns {}", on_conflict)));
            }
            let existing = state.tables.get(table).and_then(|rows| {
                rows.iter()
                    .position(|r| columns.iter().all(|c| r.get(*c) == fields.get(*c)))
            });
            match existing {
                Some(pos) => {
                    let (old, new) = state.patch(table, pos, fields);
                    let sinks = state.sinks_for(table, &new);
                    (RawChange::update(table, new.clone(), Some(old)), new, sinks)
                }
                None => {
                    let stored = state.stamp_new(table, fields)?;
                    state.rows_mut(table).push(stored.clone());
                    let sinks = state.sinks_for(table, &stored);
                    (RawChange::insert(table, stored.clone()), stored, sinks)
                }
            }
        };
        debug!(table, on_conflict, kind = ?change.event_type, "upsert");
        self.fan_out(sinks, change);
        Ok(stored)
    }

    async fn delete(&self, table: &str, id: &EntityId) -> Result<()> {
        let removed = {
            let mut state = self.state.borrow_mut();
            state.take_write_fault(table)?;
            match state.position(table, id.as_str()) {
                Some(pos) => {
                    let old = state.rows_mut(table).remove(pos);
                    let sinks = state.sinks_for(table, &old);
                    Some((old, sinks))
                }
                None => None,
            }
        };
        if let Some((old, sinks)) = removed {
            debug!(table, %id, "delete");
            self.fan_out(sinks, RawChange::delete(table, old));
        }
        Ok(())
    }
}

struct MemoryChannel {
    id: u64,
    name: String,
    state: Weak<RefCell<State>>,
}

impl ChannelHandle for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.borrow_mut().channels.retain(|c| c.id != self.id);
        }
    }
}

impl RealtimeTransport for MemoryBackend {
    fn open_channel(
        &self,
        name: &str,
        table: &str,
        filter: &ChannelFilter,
        sink: ChannelSink,
    ) -> Result<Box<dyn ChannelHandle>> {
        let id = {
            let mut state = self.state.borrow_mut();
            if let Some(message) = state.faults.open.take() {
                return Err(Error::subscription(name, message));
            }
            if !state.online {
                return Err(Error::subscription(name, "transport offline"));
            }
            state.next_channel += 1;
            let id = state.next_channel;
            state.channels.push(OpenChannel {
                id,
                name: name.to_string(),
                table: table.to_string(),
                filter: filter.clone(),
                sink: sink.clone(),
            });
            id
        };
        sink(ChannelMessage::Status(ChannelStatus::Subscribed));
        Ok(Box::new(MemoryChannel {
            id,
            name: name.to_string(),
            state: Rc::downgrade(&self.state),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn recorder() -> (ChannelSink, Rc<RefCell<Vec<ChannelMessage>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let sink: ChannelSink = Rc::new(move |m| log_clone.borrow_mut().push(m));
        (sink, log)
    }

    fn changes(log: &Rc<RefCell<Vec<ChannelMessage>>>) -> Vec<RawChange> {
        log.borrow()
            .iter()
            .filter_map(|m| match m {
                ChannelMessage::Change(c) => Some(c.clone()),
                ChannelMessage::Status(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_insert_stamps_and_fans_out_by_filter() {
        let backend = MemoryBackend::new();
        let (sink_h1, log_h1) = recorder();
        let (sink_h2, log_h2) = recorder();
        let _a = backend
            .open_channel("c1", "alerts", &ChannelFilter::eq("household_id", "h1"), sink_h1)
            .unwrap();
        let _b = backend
            .open_channel("c2", "alerts", &ChannelFilter::eq("household_id", "h2"), sink_h2)
            .unwrap();

        let row = block_on(backend.insert("alerts", json!({"household_id": "h1", "kind": "k", "message": "m"})))
            .unwrap();

        assert!(row["id"].as_str().unwrap().starts_with("alerts-"));
        assert!(row["updated_at"].is_string());
        assert_eq!(changes(&log_h1).len(), 1);
        assert!(changes(&log_h2).is_empty());
        assert_eq!(log_h1.borrow()[0], ChannelMessage::Status(ChannelStatus::Subscribed));
    }

    #[test]
    fn test_update_advances_updated_at() {
        let backend = MemoryBackend::new();
        let row = backend.put_row("care_tasks", json!({"id": "t1", "household_id": "h1", "active": true}));
        let updated = block_on(backend.update("care_tasks", &EntityId::from("t1"), json!({"active": false}))).unwrap();

        assert_eq!(updated["active"], json!(false));
        assert!(updated["updated_at"].as_str() > row["updated_at"].as_str());
        assert_eq!(updated["created_at"], row["created_at"]);
    }

    #[test]
    fn test_update_missing_row_fails() {
        let backend = MemoryBackend::new();
        let err = block_on(backend.update("care_tasks", &EntityId::from("nope"), json!({}))).unwrap_err();
        assert!(matches!(err, Error::Mutation { .. }));
    }

    #[test]
    fn test_upsert_on_conflict_key() {
        let backend = MemoryBackend::new();
        let (sink, log) = recorder();
        let _c = backend
            .open_channel("c", "task_completions", &ChannelFilter::eq("household_id", "h1"), sink)
            .unwrap();
        let row = json!({"household_id": "h1", "task_id": "t1", "date": "2024-05-06", "status": "completed"});

        let first = block_on(backend.upsert("task_completions", row.clone(), "task_id,date")).unwrap();
        let second = block_on(backend.upsert("task_completions", row, "task_id,date")).unwrap();

        assert_eq!(first["id"], second["id"]);
        assert_eq!(backend.rows("task_completions").len(), 1);
        let kinds: Vec<_> = changes(&log).iter().map(|c| c.event_type).collect();
        assert_eq!(kinds, vec![carelink_core::ChangeKind::Insert, carelink_core::ChangeKind::Update]);
    }

    #[test]
    fn test_delete_sends_old_row() {
        let backend = MemoryBackend::new();
        backend.put_row("task_completions", json!({"id": "c1", "household_id": "h1"}));
        let (sink, log) = recorder();
        let _c = backend
            .open_channel("c", "task_completions", &ChannelFilter::eq("household_id", "h1"), sink)
            .unwrap();

        block_on(backend.delete("task_completions", &EntityId::from("c1"))).unwrap();
        block_on(backend.delete("task_completions", &EntityId::from("c1"))).unwrap();

        let sent = changes(&log);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].old.as_ref().unwrap()["id"], json!("c1"));
    }

    #[test]
    fn test_closed_channel_receives_nothing() {
        let backend = MemoryBackend::new();
        let (sink, log) = recorder();
        let mut handle = backend
            .open_channel("c", "alerts", &ChannelFilter::eq("household_id", "h1"), sink)
            .unwrap();
        handle.close();
        handle.close();
        assert!(backend.open_channels().is_empty());

        block_on(backend.insert("alerts", json!({"household_id": "h1"}))).unwrap();
        assert!(changes(&log).is_empty());
    }

    #[test]
    fn test_disconnect_misses_events() {
        let backend = MemoryBackend::new();
        let (sink, log) = recorder();
        let _c = backend
            .open_channel("c", "alerts", &ChannelFilter::eq("household_id", "h1"), sink)
            .unwrap();

        backend.disconnect("network down");
        block_on(backend.insert("alerts", json!({"household_id": "h1"}))).unwrap();
        backend.reconnect();

        assert!(changes(&log).is_empty());
        let log = log.borrow();
        assert_eq!(log[1], ChannelMessage::Status(ChannelStatus::Failed("network down".into())));
        assert_eq!(log[2], ChannelMessage::Status(ChannelStatus::Reconnected));
    }

    #[test]
    fn test_server_close_mutes_channel() {
        let backend = MemoryBackend::new();
        let (sink, log) = recorder();
        let mut handle = backend
            .open_channel("c", "alerts", &ChannelFilter::eq("household_id", "h1"), sink)
            .unwrap();

        backend.close_channels();
        block_on(backend.insert("alerts", json!({"household_id": "h1"}))).unwrap();
        handle.close();

        assert!(backend.open_channels().is_empty());
        assert!(changes(&log).is_empty());
        assert_eq!(log.borrow()[1], ChannelMessage::Status(ChannelStatus::Closed));
    }

    #[test]
    fn test_open_while_offline_fails() {
        let backend = MemoryBackend::new();
        backend.disconnect("network down");
        let (sink, log) = recorder();

        let err = backend
            .open_channel("c", "alerts", &ChannelFilter::eq("household_id", "h1"), sink)
            .err()
            .unwrap();

        assert_eq!(err, Error::subscription("c", "transport offline"));
        assert!(backend.open_channels().is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_faults_fire_once() {
        let backend = MemoryBackend::new();
        backend.fail_next_write("boom");
        assert!(block_on(backend.insert("alerts", json!({"household_id": "h1"}))).is_err());
        assert!(block_on(backend.insert("alerts", json!({"household_id": "h1"}))).is_ok());

        backend.fail_next_open("refused");
        let (sink, _) = recorder();
        let err = backend
            .open_channel("c", "alerts", &ChannelFilter::eq("household_id", "h1"), sink)
            .err()
            .unwrap();
        assert_eq!(err, Error::subscription("c", "refused"));
    }

    #[test]
    fn test_paused_select_returns_rows_as_of_request() {
        let backend = MemoryBackend::new();
        backend.put_row("alerts", json!({"id": "a1", "household_id": "h1"}));
        backend.pause_selects();

        let query = SelectQuery::from("alerts");
        let rows = block_on(async {
            let pending = backend.select(&query);
            futures::pin_mut!(pending);
            assert!(futures::poll!(pending.as_mut()).is_pending());
            assert_eq!(backend.pending_selects(), 1);

            backend.put_row("alerts", json!({"id": "a2", "household_id": "h1"}));
            backend.release_selects();
            pending.await
        })
        .unwrap();

        assert_eq!(rows.len(), 1);
    }
}
