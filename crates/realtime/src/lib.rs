//! Carelink Realtime - the remote side of the realtime layer.
//!
//! This crate provides:
//!
//! - `RemoteStore` and `RealtimeTransport`: the boundary with the hosted data service
//! - `Subscription`: one household-scoped change channel, closed on drop
//! - Snapshot loading: whole-scope, paged and single-row loads
//! - `MemoryBackend`: an in-process store and transport
//!
//! # Example
//!
//! ```ignore
//! use carelink_realtime::{snapshot, MemoryBackend, SnapshotRequest, Subscription};
//!
//! let backend = MemoryBackend::new();
//! let household = HouseholdId::from("h1");
//!
//! let _sub = Subscription::subscribe::<Alert, _>(&backend, "carelink", &household, |delivery| {
//!     println!("{:?}", delivery);
//! })?;
//! let alerts: Vec<Alert> = snapshot::load(&backend, &SnapshotRequest::household(household)).await?;
//! ```

pub mod channel;
pub mod memory;
pub mod query;
pub mod remote;
pub mod snapshot;

pub use channel::{channel_name, Delivery, Subscription};
pub use memory::MemoryBackend;
pub use query::{Direction, Filter, Order, Range, SelectQuery};
pub use remote::{
    ChannelFilter, ChannelHandle, ChannelMessage, ChannelSink, ChannelStatus, RealtimeTransport, RemoteStore, Row,
};
pub use snapshot::{Page, SnapshotRequest};
