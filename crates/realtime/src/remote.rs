//! Boundary with the remote data service.
//!
//! The remote store is the single source of truth. `RemoteStore` covers the
//! request/response side (select and the write path) and `RealtimeTransport`
//! the push side (change channels). Both are object safe so a `Connection`
//! can hold them behind `Rc<dyn _>`.

use crate::query::{value_text, SelectQuery};
use async_trait::async_trait;
use carelink_core::{EntityId, HouseholdId, RawChange, Result};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// A row as exchanged with the store.
pub type Row = Value;

/// Request/response access to the remote tables.
#[async_trait(?Send)]
pub trait RemoteStore {
    /// Returns the rows matching a query, in query order.
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>>;

    /// Inserts a row and returns it as stored.
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Patches the row with the given id and returns it as stored.
    async fn update(&self, table: &str, id: &EntityId, patch: Row) -> Result<Row>;

    /// Inserts a row, or patches the row that shares the conflict columns.
    ///
    /// `on_conflict` is a comma-separated column list, e.g. `"task_id,date"`.
    async fn upsert(&self, table: &str, row: Row, on_conflict: &str) -> Result<Row>;

    /// Hard-deletes a row. Deleting an absent id succeeds.
    async fn delete(&self, table: &str, id: &EntityId) -> Result<()>;
}

/// Lifecycle notifications for an open channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The channel is live.
    Subscribed,
    /// The transport came back after a drop. Events may have been missed.
    Reconnected,
    /// The channel was closed by the server.
    Closed,
    /// The channel failed to join or dropped.
    Failed(String),
}

/// Everything a channel delivers to its sink.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelMessage {
    Change(RawChange),
    Status(ChannelStatus),
}

/// Callback receiving channel messages. Runs to completion before the next
/// message is delivered.
pub type ChannelSink = Rc<dyn Fn(ChannelMessage)>;

/// Server-side row filter of a channel, `<column>=eq.<value>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelFilter {
    pub column: String,
    pub value: String,
}

impl ChannelFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Filter on the tenant column.
    pub fn tenant(column: &str, household: &HouseholdId) -> Self {
        Self::eq(column, household.as_str())
    }

    /// Parses the `<column>=eq.<value>` form.
    pub fn parse(filter: &str) -> Option<Self> {
        let (column, rest) = filter.split_once('=')?;
        let value = rest.strip_prefix("eq.")?;
        if column.is_empty() {
            return None;
        }
        Some(Self::eq(column, value))
    }

    /// Returns true if a row image passes the filter.
    pub fn matches(&self, row: &Value) -> bool {
        row.get(&self.column)
            .and_then(value_text)
            .map_or(false, |text| text == self.value)
    }
}

impl fmt::Display for ChannelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// An open channel. Closing is idempotent.
pub trait ChannelHandle {
    fn name(&self) -> &str;

    fn close(&mut self);
}

/// Push side of the remote service.
pub trait RealtimeTransport {
    /// Opens a channel delivering changes to `table` rows that pass `filter`.
    fn open_channel(
        &self,
        name: &str,
        table: &str,
        filter: &ChannelFilter,
        sink: ChannelSink,
    ) -> Result<Box<dyn ChannelHandle>>;
}
