//! Carelink Client - live, household-scoped collections for UI code.
//!
//! This crate provides:
//!
//! - `Connection`: the injected store, transport and configuration
//! - `LiveCollection`: a snapshot kept current by its change channel
//! - `PagedCollection`: the same, loaded one page at a time
//! - `Mutations`: the write path
//! - `Dashboard` and `TodayView`: the caregiver home screen
//!
//! # Example
//!
//! ```ignore
//! use carelink_client::{dashboard, ClientConfig, Connection, Mutations};
//! use carelink_realtime::MemoryBackend;
//!
//! let connection = Connection::from_backend(Rc::new(MemoryBackend::new()), ClientConfig::default());
//! let household = HouseholdId::from("h1");
//!
//! let today = dashboard::mount_tasks(&connection, &household, DayScope::for_date(date)).await;
//! Mutations::new(&connection).create_task(&draft).await?;
//! // `today` now holds the new task if it is scheduled for `date`.
//! ```

pub mod config;
pub mod connection;
pub mod dashboard;
pub mod live;
pub mod mutations;
pub mod paged;

pub use config::ClientConfig;
pub use connection::Connection;
pub use dashboard::{Dashboard, TodayItem, TodayView};
pub use live::LiveCollection;
pub use mutations::Mutations;
pub use paged::PagedCollection;

pub use carelink_core::{Error, Result};
