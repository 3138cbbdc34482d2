//! Snapshot loading.
//!
//! A snapshot is a single select; it either decodes completely or fails.

use crate::query::{Direction, SelectQuery};
use crate::remote::RemoteStore;
use carelink_core::{decode_row, Entity, HouseholdId, Result};
use tracing::debug;

/// What to load for one mounted scope, independent of the entity type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRequest {
    household: HouseholdId,
    filters: Vec<(String, String)>,
    order: Vec<(String, Direction)>,
}

impl SnapshotRequest {
    /// Loads every row of one household.
    pub fn household(household: HouseholdId) -> Self {
        Self {
            household,
            filters: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Adds an equality filter.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    /// Adds an ordering key.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    #[inline]
    pub fn household_id(&self) -> &HouseholdId {
        &self.household
    }

    /// Builds the select for entity `E`.
    pub fn query<E: Entity>(&self) -> SelectQuery {
        let mut query = SelectQuery::from(E::TABLE).eq(E::TENANT_COLUMN, self.household.as_str());
        for (column, value) in &self.filters {
            query = query.eq(column.clone(), value.clone());
        }
        for (column, direction) in &self.order {
            query = query.order(column.clone(), *direction);
        }
        query
    }
}

/// One page of an unbounded collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<E> {
    pub items: Vec<E>,
    /// True when the page came back full, so another page may exist.
    pub has_more: bool,
}

/// Loads the whole scope in order.
pub async fn load<E: Entity>(store: &dyn RemoteStore, request: &SnapshotRequest) -> Result<Vec<E>> {
    run(store, request.query::<E>()).await
}

/// Loads `page_size` rows starting at `offset`.
pub async fn load_page<E: Entity>(
    store: &dyn RemoteStore,
    request: &SnapshotRequest,
    offset: usize,
    page_size: usize,
) -> Result<Page<E>> {
    let items = run(store, request.query::<E>().range(offset, page_size)).await?;
    let has_more = page_size > 0 && items.len() == page_size;
    Ok(Page { items, has_more })
}

/// Loads the first matching row. No row is `Ok(None)`.
pub async fn load_single<E: Entity>(store: &dyn RemoteStore, request: &SnapshotRequest) -> Result<Option<E>> {
    let mut rows = run(store, request.query::<E>().range(0, 1)).await?;
    Ok(rows.pop())
}

async fn run<E: Entity>(store: &dyn RemoteStore, query: SelectQuery) -> Result<Vec<E>> {
    debug!(query = %query, "loading snapshot");
    let rows = store.select(&query).await?;
    let items = rows.iter().map(decode_row::<E>).collect::<Result<Vec<E>>>()?;
    debug!(table = E::TABLE, rows = items.len(), "snapshot loaded");
    Ok(items)
}
