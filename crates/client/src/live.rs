//! Live collections.
//!
//! A `LiveCollection` mirrors one household-scoped slice of a remote table.
//! It opens the change channel first, then loads the snapshot. Events that
//! arrive while the snapshot is outstanding are queued and replayed on top of
//! it in arrival order, so the collection ends on the newest row whether or
//! not the snapshot already reflects them.
//!
//! A channel the server closes or fails is dead: later messages on it are
//! ignored and [`LiveCollection::reconnect`] opens a fresh one.

use crate::connection::Connection;
use carelink_core::{ChangeEvent, Entity, EntityId, Error, HouseholdId, Result};
use carelink_reconcile::{ChangeSet, Membership, ObserverId, ReconciledCollection};
use carelink_realtime::{snapshot, ChannelStatus, Delivery, SnapshotRequest, Subscription};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

struct LiveState<E, M> {
    collection: ReconciledCollection<E, M>,
    /// Name of the live channel; `None` if it never opened or died.
    channel: Option<String>,
    /// Bumped by every channel open and every channel death. Deliveries
    /// tagged with another epoch come from a dead channel.
    channel_epoch: u64,
    loading: bool,
    last_error: Option<Error>,
    /// Bumped by every load; a response for an older generation is dropped.
    generation: u64,
    /// Events received while a load is outstanding.
    buffer: Option<Vec<ChangeEvent<E>>>,
    needs_resync: bool,
    torn_down: bool,
}

/// How a finished load is merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoadMode {
    /// Replace the collection with the rows.
    Replace,
    /// Merge the rows into the collection as inserts.
    Append,
}

/// A household-scoped collection kept current by its change channel.
pub struct LiveCollection<E, M> {
    connection: Connection,
    request: SnapshotRequest,
    state: Rc<RefCell<LiveState<E, M>>>,
    subscription: RefCell<Option<Subscription>>,
}

impl<E, M> LiveCollection<E, M>
where
    E: Entity,
    M: Membership<E> + 'static,
{
    /// Opens the channel without loading. The collection is empty until
    /// [`refetch`](Self::refetch) completes.
    ///
    /// A channel that fails to open is recorded in [`last_error`](Self::last_error);
    /// [`reconnect`](Self::reconnect) retries it.
    pub fn open(connection: &Connection, request: SnapshotRequest, membership: M) -> Self {
        let state = Rc::new(RefCell::new(LiveState {
            collection: ReconciledCollection::new(membership),
            channel: None,
            channel_epoch: 0,
            loading: false,
            last_error: None,
            generation: 0,
            buffer: None,
            needs_resync: false,
            torn_down: false,
        }));
        let live = Self {
            connection: connection.clone(),
            request,
            state,
            subscription: RefCell::new(None),
        };
        live.open_channel();
        live
    }

    /// Opens the channel and loads the snapshot.
    ///
    /// A failed load leaves an empty collection with the error in
    /// [`last_error`](Self::last_error).
    pub async fn mount(connection: &Connection, request: SnapshotRequest, membership: M) -> Self {
        let live = Self::open(connection, request, membership);
        // Already recorded in last_error.
        let _ = live.refetch().await;
        live
    }

    /// Returns the household this collection is scoped to.
    #[inline]
    pub fn household(&self) -> &HouseholdId {
        self.request.household_id()
    }

    /// Returns the members in display order.
    pub fn items(&self) -> Vec<E> {
        self.state.borrow().collection.items().to_vec()
    }

    /// Runs `f` over the members without cloning them.
    pub fn with_items<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        f(self.state.borrow().collection.items())
    }

    pub fn len(&self) -> usize {
        self.state.borrow().collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().collection.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<E> {
        self.state.borrow().collection.get(id).cloned()
    }

    pub fn is_provisional(&self, id: &EntityId) -> bool {
        self.state.borrow().collection.is_provisional(id)
    }

    /// Returns true while a snapshot load is outstanding.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Returns the most recent load or channel error.
    pub fn last_error(&self) -> Option<Error> {
        self.state.borrow().last_error.clone()
    }

    /// Returns true once the channel dropped or reconnected, meaning events
    /// may have been missed. Cleared by a successful load.
    pub fn needs_resync(&self) -> bool {
        self.state.borrow().needs_resync
    }

    /// Returns the live channel's name.
    pub fn channel_name(&self) -> Option<String> {
        self.state.borrow().channel.clone()
    }

    /// Returns true once [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.state.borrow().torn_down
    }

    /// Registers a callback run after every change to the collection.
    ///
    /// The callback runs while the collection is borrowed and must not call
    /// back into it; everything it needs is in the change set.
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&ChangeSet<E>) + 'static,
    {
        self.state.borrow_mut().collection.observe(callback)
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.state.borrow_mut().collection.unobserve(id)
    }

    /// Reloads the snapshot and replaces the collection with it.
    ///
    /// If a newer load starts or the collection is torn down before the
    /// response arrives, the response is dropped and this returns `Ok(())`.
    pub async fn refetch(&self) -> Result<()> {
        let fetch = snapshot::load::<E>(self.connection.store(), &self.request);
        self.load_with(fetch, LoadMode::Replace).await.map(|_| ())
    }

    /// Replaces a channel that failed, closed or never opened, then reloads
    /// the snapshot.
    pub async fn reconnect(&self) -> Result<()> {
        if self.is_torn_down() {
            return Ok(());
        }
        self.ensure_channel()?;
        info!(table = E::TABLE, household = %self.household(), "resyncing after reconnect");
        self.refetch().await
    }

    /// Opens a fresh channel unless the current one is live.
    pub(crate) fn ensure_channel(&self) -> Result<()> {
        if self.is_torn_down() || self.channel_name().is_some() {
            return Ok(());
        }
        if let Some(mut dead) = self.subscription.borrow_mut().take() {
            debug!(table = E::TABLE, channel = dead.name(), "releasing dead channel");
            dead.unsubscribe();
        }
        self.open_channel();
        let state = self.state.borrow();
        match &state.last_error {
            Some(err @ Error::Subscription { .. }) if state.channel.is_none() => Err(err.clone()),
            _ => Ok(()),
        }
    }

    #[inline]
    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Applies a local write before the store confirms it.
    ///
    /// `entity` must carry the id the store will report for it. If `write`
    /// fails, the previous member (or its absence) is restored.
    pub async fn optimistic<T, Fut>(&self, entity: E, write: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let id = entity.id().clone();
        let prior = {
            let mut state = self.state.borrow_mut();
            let prior = state.collection.get(&id).cloned();
            state.collection.apply_optimistic(entity);
            prior
        };
        match write.await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(table = E::TABLE, %id, error = %err, "reverting optimistic write");
                self.state.borrow_mut().collection.revert_optimistic(&id, prior);
                Err(err)
            }
        }
    }

    /// Runs a load and merges its rows. Returns the number of rows fetched,
    /// or `None` if the response was dropped as stale.
    pub(crate) async fn load_with<Fut>(&self, fetch: Fut, mode: LoadMode) -> Result<Option<usize>>
    where
        Fut: Future<Output = Result<Vec<E>>>,
    {
        let generation = {
            let mut state = self.state.borrow_mut();
            if state.torn_down {
                return Ok(None);
            }
            state.generation += 1;
            state.loading = true;
            if self.connection.config().buffer_during_load && state.buffer.is_none() {
                state.buffer = Some(Vec::new());
            }
            state.generation
        };

        let result = fetch.await;

        let mut state = self.state.borrow_mut();
        if state.torn_down || state.generation != generation {
            debug!(table = E::TABLE, generation, current = state.generation, "dropping stale load");
            return Ok(None);
        }
        state.loading = false;
        let buffered = state.buffer.take().unwrap_or_default();
        match result {
            Ok(rows) => {
                let fetched = rows.len();
                match mode {
                    LoadMode::Replace => {
                        state.collection.seed(rows);
                    }
                    LoadMode::Append => {
                        state.collection.apply_batch(rows.into_iter().map(ChangeEvent::Insert));
                    }
                }
                if !buffered.is_empty() {
                    debug!(table = E::TABLE, events = buffered.len(), "replaying buffered events");
                    state.collection.apply_batch(buffered);
                }
                // A channel that never opened still needs reconnect().
                let channel_open = state.channel.is_some();
                if channel_open || !matches!(state.last_error, Some(Error::Subscription { .. })) {
                    state.last_error = None;
                }
                if channel_open {
                    state.needs_resync = false;
                }
                Ok(Some(fetched))
            }
            Err(err) => {
                state.collection.apply_batch(buffered);
                warn!(table = E::TABLE, household = %self.request.household_id(), error = %err, "load failed");
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn open_channel(&self) {
        let epoch = {
            let mut state = self.state.borrow_mut();
            state.channel_epoch += 1;
            state.channel_epoch
        };
        let weak = Rc::downgrade(&self.state);
        let scope = self.household().clone();
        let opened = self.connection.subscribe::<E, _>(self.household(), move |delivery| {
            on_delivery(&weak, &scope, epoch, delivery)
        });
        let mut state = self.state.borrow_mut();
        match opened {
            Ok(subscription) => {
                state.channel = Some(subscription.name().to_string());
                if matches!(state.last_error, Some(Error::Subscription { .. })) {
                    state.last_error = None;
                }
                *self.subscription.borrow_mut() = Some(subscription);
            }
            Err(err) => {
                warn!(table = E::TABLE, error = %err, "channel failed to open");
                state.channel = None;
                state.needs_resync = true;
                state.last_error = Some(err);
            }
        }
    }
}

impl<E, M> LiveCollection<E, M> {
    /// Closes the channel and drops any in-flight load. Later calls do nothing.
    pub fn teardown(&self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.torn_down = true;
            state.loading = false;
            state.buffer = None;
            state.channel = None;
        }
        if let Ok(mut slot) = self.subscription.try_borrow_mut() {
            if let Some(mut subscription) = slot.take() {
                subscription.unsubscribe();
            }
        }
    }
}

impl<E, M> Drop for LiveCollection<E, M> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<E, M> fmt::Debug for LiveCollection<E, M>
where
    E: Entity,
    M: Membership<E>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("LiveCollection")
            .field("table", &E::TABLE)
            .field("household", self.request.household_id())
            .field("channel", &state.channel)
            .field("len", &state.collection.len())
            .field("loading", &state.loading)
            .field("last_error", &state.last_error)
            .finish()
    }
}

fn on_delivery<E, M>(
    weak: &Weak<RefCell<LiveState<E, M>>>,
    household: &HouseholdId,
    epoch: u64,
    delivery: Delivery<E>,
) where
    E: Entity,
    M: Membership<E>,
{
    let Some(state) = weak.upgrade() else {
        return;
    };
    let Ok(mut state) = state.try_borrow_mut() else {
        warn!(table = E::TABLE, "change delivered during a collection callback, dropped");
        return;
    };
    if state.torn_down || state.channel_epoch != epoch {
        return;
    }
    match delivery {
        Delivery::Event(event) => {
            let foreign = match &event {
                ChangeEvent::Insert(e) | ChangeEvent::Update(e) => e.household_id() != household,
                ChangeEvent::Delete(_) => false,
            };
            if foreign {
                warn!(table = E::TABLE, id = %event.id(), %household, "dropping change for another household");
                return;
            }
            match state.buffer.as_mut() {
                Some(buffer) => buffer.push(event),
                None => {
                    state.collection.apply(event);
                }
            }
        }
        Delivery::Status(ChannelStatus::Subscribed) => {
            debug!(table = E::TABLE, channel = ?state.channel, "subscribed");
        }
        Delivery::Status(ChannelStatus::Reconnected) => {
            info!(table = E::TABLE, channel = ?state.channel, "channel reconnected, snapshot is stale");
            state.needs_resync = true;
        }
        Delivery::Status(ChannelStatus::Closed) => {
            warn!(table = E::TABLE, channel = ?state.channel, "channel closed by server");
            mark_dead(&mut state, "closed by server".to_string());
        }
        Delivery::Status(ChannelStatus::Failed(reason)) => {
            warn!(table = E::TABLE, channel = ?state.channel, %reason, "channel failed");
            mark_dead(&mut state, reason);
        }
    }
}

/// Records a channel death. The subscription itself is released by the next
/// `reconnect`, outside the transport's callback.
fn mark_dead<E, M>(state: &mut LiveState<E, M>, reason: String) {
    let channel = state.channel.take().unwrap_or_default();
    state.channel_epoch += 1;
    state.last_error = Some(Error::subscription(channel, reason));
    state.needs_resync = true;
}
