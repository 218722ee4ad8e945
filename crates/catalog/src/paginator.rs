//! Walks the paged "top rated" listing of the catalog.
//!
//! ## Algorithm
//! 1. Fetch page 1 and remember its `total_pages`
//! 2. Fetch pages `2..=total_pages` in increasing order
//! 3. Emit identifiers in page order, then in listing order within a page
//!
//! `total_pages` is only read from page 1. Each call to
//! [`CatalogPaginator::list_all_identifiers`] starts a fresh cursor, so the
//! sequence can be replayed by calling it again.

use std::sync::Arc;

use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info};

use crate::client::CatalogApi;
use crate::error::{RecsError, Result};
use crate::types::CatalogId;

/// Position of a listing in progress; dropped once the last page is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageCursor {
    page: u32,
    total_pages: u32,
}

impl PageCursor {
    fn next_page(cursor: Option<PageCursor>) -> Option<u32> {
        match cursor {
            None => Some(1),
            Some(c) if c.page >= c.total_pages => None,
            Some(c) => Some(c.page + 1),
        }
    }
}

/// Lazily lists every identifier in the "top rated" catalog.
#[derive(Clone)]
pub struct CatalogPaginator {
    catalog: Arc<dyn CatalogApi>,
}

impl CatalogPaginator {
    pub fn new(catalog: Arc<dyn CatalogApi>) -> Self {
        Self { catalog }
    }

    /// Stream of pages, each the identifiers listed on that page.
    ///
    /// A failed fetch yields one error naming the page and ends the stream.
    pub fn pages(&self) -> impl Stream<Item = Result<Vec<CatalogId>>> + Send + use<> {
        let catalog = Arc::clone(&self.catalog);

        stream::try_unfold(None, move |cursor: Option<PageCursor>| {
            let catalog = Arc::clone(&catalog);
            async move {
                let Some(page) = PageCursor::next_page(cursor) else {
                    return Ok(None);
                };

                let listing = catalog.top_rated_page(page).await.map_err(|e| match e {
                    RecsError::Transport { message, .. } => RecsError::Transport {
                        context: format!("top rated listing failed at page {page}"),
                        message,
                    },
                    other => other,
                })?;

                let total_pages = match cursor {
                    Some(c) => c.total_pages,
                    None => {
                        let total_pages = listing.total_pages.max(1);
                        info!(
                            total_pages,
                            total_results = listing.total_results,
                            "Listing top rated catalog"
                        );
                        total_pages
                    }
                };

                let ids: Vec<CatalogId> = listing.results.iter().map(|movie| movie.id).collect();
                debug!(page, total_pages, count = ids.len(), "Fetched top rated page");

                Ok(Some((ids, Some(PageCursor { page, total_pages }))))
            }
        })
    }

    /// Every identifier in listing order.
    ///
    /// Identifiers from pages fetched before a failure are still yielded;
    /// use [`CatalogPaginator::collect_all`] for all-or-nothing semantics.
    pub fn list_all_identifiers(&self) -> impl Stream<Item = Result<CatalogId>> + Send + use<> {
        self.pages()
            .map_ok(|ids| stream::iter(ids.into_iter().map(Ok::<_, RecsError>)))
            .try_flatten()
    }

    /// Collect the whole listing, discarding everything on the first error.
    pub async fn collect_all(&self) -> Result<Vec<CatalogId>> {
        self.list_all_identifiers().try_collect().await
    }
}
