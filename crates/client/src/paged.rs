//! Paginated live collections.
//!
//! Pages are fetched by offset. New rows pushed over the channel shift later
//! pages, so a page can repeat rows already held; the merge drops those.

use crate::connection::Connection;
use crate::live::{LiveCollection, LoadMode};
use carelink_core::{Entity, Error, Result};
use carelink_reconcile::Newest;
use carelink_realtime::{snapshot, SnapshotRequest};
use std::cell::Cell;
use tracing::debug;

/// A newest-first live collection loaded one page at a time.
pub struct PagedCollection<E> {
    live: LiveCollection<E, Newest>,
    request: SnapshotRequest,
    page_size: usize,
    /// Rows fetched so far, the offset of the next page.
    fetched: Cell<usize>,
    has_more: Cell<bool>,
}

impl<E: Entity> PagedCollection<E> {
    /// Opens the channel and loads the first page.
    ///
    /// `request` should order newest first, e.g. by `created_at` descending.
    pub async fn mount(connection: &Connection, request: SnapshotRequest) -> Self {
        let page_size = connection.config().journal_page_size;
        let paged = Self {
            live: LiveCollection::open(connection, request.clone(), Newest),
            request,
            page_size,
            fetched: Cell::new(0),
            has_more: Cell::new(false),
        };
        // Already recorded in last_error.
        let _ = paged.refetch().await;
        paged
    }

    /// Returns the underlying live collection.
    #[inline]
    pub fn live(&self) -> &LiveCollection<E, Newest> {
        &self.live
    }

    pub fn items(&self) -> Vec<E> {
        self.live.items()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.live.is_loading()
    }

    pub fn last_error(&self) -> Option<Error> {
        self.live.last_error()
    }

    /// Returns true if the last page came back full.
    pub fn has_more(&self) -> bool {
        self.has_more.get()
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reloads the first page and replaces the collection with it.
    pub async fn refetch(&self) -> Result<()> {
        let fetch = self.fetch_page(0);
        if let Some(count) = self.live.load_with(fetch, LoadMode::Replace).await? {
            self.fetched.set(count);
            self.has_more.set(self.page_size > 0 && count == self.page_size);
        }
        Ok(())
    }

    /// Appends the next page. Does nothing while a load is outstanding or
    /// once the last page has been seen.
    pub async fn load_more(&self) -> Result<()> {
        if !self.has_more() || self.live.is_loading() || self.live.is_torn_down() {
            return Ok(());
        }
        let offset = self.fetched.get();
        debug!(table = E::TABLE, offset, page_size = self.page_size, "loading next page");
        let fetch = self.fetch_page(offset);
        if let Some(count) = self.live.load_with(fetch, LoadMode::Append).await? {
            self.fetched.set(offset + count);
            self.has_more.set(self.page_size > 0 && count == self.page_size);
        }
        Ok(())
    }

    /// Reopens a failed channel and reloads from the first page.
    pub async fn reconnect(&self) -> Result<()> {
        if self.live.is_torn_down() {
            return Ok(());
        }
        self.live.ensure_channel()?;
        self.refetch().await
    }

    pub fn teardown(&self) {
        self.live.teardown();
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<E>> {
        let store = self.live.connection().store();
        let page = snapshot::load_page::<E>(store, &self.request, offset, self.page_size).await?;
        Ok(page.items)
    }
}
