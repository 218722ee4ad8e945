//! In-memory [`CatalogApi`] for tests.
//!
//! Enabled for this crate's own tests and, through the `test-util` feature,
//! for downstream crates. Every call is recorded so tests can assert on the
//! exact sequence of requests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::CatalogApi;
use crate::error::{RecsError, Result};
use crate::types::{
    CatalogId, Keyword, KeywordList, ListedMovie, MovieDetails, SearchResult, TopRatedPage,
};

/// One recorded request against [`StubCatalog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    Search(String),
    Details(CatalogId),
    Keywords(CatalogId),
    TopRated(u32),
}

/// Catalog stub with canned responses and injectable failures.
///
/// Movies without registered details come back as `"Movie {id}"` with no
/// overview and no keywords, so large listings need no per-movie setup.
#[derive(Debug, Default)]
pub struct StubCatalog {
    searches: HashMap<String, Vec<SearchResult>>,
    details: HashMap<CatalogId, MovieDetails>,
    keywords: HashMap<CatalogId, Vec<String>>,
    pages: Vec<Vec<CatalogId>>,
    later_total_pages: Option<u32>,
    failing_pages: HashSet<u32>,
    failing_details: HashSet<CatalogId>,
    failing_keywords: HashSet<CatalogId>,
    calls: Mutex<Vec<CatalogCall>>,
}

impl StubCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register search hits, as `(id, title)` pairs, for an exact query.
    pub fn with_search(mut self, query: &str, hits: &[(CatalogId, &str)]) -> Self {
        let results = hits
            .iter()
            .map(|&(id, title)| SearchResult {
                id,
                title: title.to_string(),
                release_date: String::new(),
            })
            .collect();
        self.searches.insert(query.to_string(), results);
        self
    }

    pub fn with_movie(mut self, id: CatalogId, title: &str, overview: &str, keywords: &[&str]) -> Self {
        self.details.insert(
            id,
            MovieDetails {
                title: title.to_string(),
                overview: overview.to_string(),
            },
        );
        self.keywords
            .insert(id, keywords.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Set the "top rated" listing; `total_pages` is the number of pages.
    pub fn with_pages(mut self, pages: Vec<Vec<CatalogId>>) -> Self {
        self.pages = pages;
        self
    }

    /// Make every page after the first report a different `total_pages`.
    pub fn with_reported_total_pages_after_first(mut self, total_pages: u32) -> Self {
        self.later_total_pages = Some(total_pages);
        self
    }

    pub fn with_failing_page(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    pub fn with_failing_details(mut self, id: CatalogId) -> Self {
        self.failing_details.insert(id);
        self
    }

    pub fn with_failing_keywords(mut self, id: CatalogId) -> Self {
        self.failing_keywords.insert(id);
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn search_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, CatalogCall::Search(_)))
            .count()
    }

    fn record(&self, call: CatalogCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl CatalogApi for StubCatalog {
    async fn search_movies(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.record(CatalogCall::Search(query.to_string()));
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }

    async fn movie_details(&self, id: CatalogId) -> Result<MovieDetails> {
        self.record(CatalogCall::Details(id));
        if self.failing_details.contains(&id) {
            return Err(RecsError::for_movie("movie details", id, "stub failure"));
        }
        Ok(self.details.get(&id).cloned().unwrap_or_else(|| MovieDetails {
            title: format!("Movie {id}"),
            overview: String::new(),
        }))
    }

    async fn movie_keywords(&self, id: CatalogId) -> Result<KeywordList> {
        self.record(CatalogCall::Keywords(id));
        if self.failing_keywords.contains(&id) {
            return Err(RecsError::for_movie("movie keywords", id, "stub failure"));
        }
        let keywords = self
            .keywords
            .get(&id)
            .map(|names| {
                names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Keyword {
                        id: i as u64,
                        name: name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(KeywordList { id, keywords })
    }

    async fn top_rated_page(&self, page: u32) -> Result<TopRatedPage> {
        self.record(CatalogCall::TopRated(page));
        if self.failing_pages.contains(&page) {
            return Err(RecsError::transport(
                format!("top rated listing failed at page {page}"),
                "stub failure",
            ));
        }

        let total_pages = match self.later_total_pages {
            Some(total) if page > 1 => total,
            _ => self.pages.len() as u32,
        };
        let results: Vec<ListedMovie> = self
            .pages
            .get(page.saturating_sub(1) as usize)
            .map(|ids| ids.iter().map(|&id| ListedMovie { id }).collect())
            .unwrap_or_default();

        Ok(TopRatedPage {
            page,
            results,
            total_pages,
            total_results: self.pages.iter().map(Vec::len).sum::<usize>() as u32,
        })
    }
}
