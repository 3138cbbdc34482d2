//! The injected handle to the remote service.

use crate::config::ClientConfig;
use carelink_core::{Entity, HouseholdId, Result};
use carelink_realtime::{Delivery, RealtimeTransport, RemoteStore, Subscription};
use std::fmt;
use std::rc::Rc;

/// Store, transport and configuration, passed explicitly to every collection
/// and to the write path. Cloning shares the same backends.
#[derive(Clone)]
pub struct Connection {
    store: Rc<dyn RemoteStore>,
    transport: Rc<dyn RealtimeTransport>,
    config: Rc<ClientConfig>,
}

impl Connection {
    pub fn new(store: Rc<dyn RemoteStore>, transport: Rc<dyn RealtimeTransport>, config: ClientConfig) -> Self {
        Self {
            store,
            transport,
            config: Rc::new(config),
        }
    }

    /// Uses one backend for both the store and the transport.
    pub fn from_backend<B>(backend: Rc<B>, config: ClientConfig) -> Self
    where
        B: RemoteStore + RealtimeTransport + 'static,
    {
        let store: Rc<dyn RemoteStore> = backend.clone();
        let transport: Rc<dyn RealtimeTransport> = backend;
        Self::new(store, transport, config)
    }

    #[inline]
    pub fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    #[inline]
    pub fn transport(&self) -> &dyn RealtimeTransport {
        self.transport.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens a household-scoped channel for entity `E`.
    pub fn subscribe<E, F>(&self, household: &HouseholdId, on_delivery: F) -> Result<Subscription>
    where
        E: Entity,
        F: Fn(Delivery<E>) + 'static,
    {
        Subscription::subscribe::<E, F>(self.transport(), &self.config.channel_prefix, household, on_delivery)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("config", &self.config).finish()
    }
}
