//! The synchronized entity shape.
//!
//! Every collection the realtime layer mirrors shares the same envelope: a
//! stable opaque id, the household (tenant) it belongs to, and the store's
//! creation/update timestamps.

use alloc::string::String;
use chrono::{DateTime, Utc};
use core::fmt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Opaque unique key of a row, stable across updates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Tenant scope. Every query, channel filter and local cache is partitioned by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseholdId(String);

impl HouseholdId {
    /// Creates a household id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HouseholdId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A record mirrored from one remote table.
pub trait Entity: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + 'static {
    /// Remote table holding rows of this type.
    const TABLE: &'static str;

    /// Column used to scope queries and channel filters to a household.
    const TENANT_COLUMN: &'static str = "household_id";

    fn id(&self) -> &EntityId;

    fn household_id(&self) -> &HouseholdId;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;
}

/// Implements `Entity` for a struct carrying the standard envelope fields.
macro_rules! impl_entity {
    ($ty:ty, $table:literal) => {
        impl $crate::entity::Entity for $ty {
            const TABLE: &'static str = $table;

            #[inline]
            fn id(&self) -> &$crate::entity::EntityId {
                &self.id
            }

            #[inline]
            fn household_id(&self) -> &$crate::entity::HouseholdId {
                &self.household_id
            }

            #[inline]
            fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.created_at
            }

            #[inline]
            fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.updated_at
            }
        }
    };
}

pub(crate) use impl_entity;
