//! Change-event subscriptions.
//!
//! A `Subscription` owns one open channel for a (household, table) pair.
//! Dropping it closes the channel, so every teardown path releases it.

use crate::remote::{ChannelFilter, ChannelHandle, ChannelMessage, ChannelSink, ChannelStatus, RealtimeTransport};
use carelink_core::{ChangeEvent, Entity, HouseholdId, Result};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static CHANNEL_SEQ: AtomicU64 = AtomicU64::new(1);

/// Returns a channel name unique within the process:
/// `{prefix}:{table}:{household}:{seq}`.
pub fn channel_name(prefix: &str, table: &str, household: &HouseholdId) -> String {
    let seq = CHANNEL_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}:{}:{}:{}", prefix, table, household, seq)
}

/// A decoded channel message for entity type `E`.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery<E> {
    Event(ChangeEvent<E>),
    Status(ChannelStatus),
}

/// An open change channel.
pub struct Subscription {
    name: String,
    table: &'static str,
    handle: Option<Box<dyn ChannelHandle>>,
}

impl Subscription {
    /// Opens a channel for `table` rows of one household, delivering raw
    /// messages to `sink`.
    pub fn open(
        transport: &dyn RealtimeTransport,
        prefix: &str,
        table: &'static str,
        tenant_column: &str,
        household: &HouseholdId,
        sink: ChannelSink,
    ) -> Result<Self> {
        let name = channel_name(prefix, table, household);
        let filter = ChannelFilter::tenant(tenant_column, household);
        let handle = transport.open_channel(&name, table, &filter, sink)?;
        debug!(channel = %name, filter = %filter, "channel opened");
        Ok(Self {
            name,
            table,
            handle: Some(handle),
        })
    }

    /// Opens a channel for entity `E`, decoding each change before handing it
    /// to `on_delivery`. Payloads that fail to decode are logged and skipped.
    pub fn subscribe<E, F>(
        transport: &dyn RealtimeTransport,
        prefix: &str,
        household: &HouseholdId,
        on_delivery: F,
    ) -> Result<Self>
    where
        E: Entity,
        F: Fn(Delivery<E>) + 'static,
    {
        let sink: ChannelSink = Rc::new(move |message| match message {
            ChannelMessage::Change(raw) => match raw.decode::<E>() {
                Ok(event) => on_delivery(Delivery::Event(event)),
                Err(err) => warn!(table = E::TABLE, error = %err, "dropping undecodable change"),
            },
            ChannelMessage::Status(status) => on_delivery(Delivery::Status(status)),
        });
        Self::open(transport, prefix, E::TABLE, E::TENANT_COLUMN, household, sink)
    }

    /// Returns the channel name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the subscribed table.
    #[inline]
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Returns true until the subscription is closed.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Closes the channel. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            debug!(channel = %self.name, "channel closed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}
