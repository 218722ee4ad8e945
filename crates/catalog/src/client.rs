//! HTTP client for the external movie catalog.
//!
//! [`CatalogApi`] is the seam the rest of the workspace depends on;
//! [`TmdbClient`] is the production implementation over `reqwest`. Every
//! request carries the configured credential as the `api_key` query
//! parameter. The client never retries: a non-2xx status or an undecodable
//! body becomes a [`RecsError::Transport`] naming the endpoint.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url, header};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{RecsError, Result};
use crate::types::{CatalogId, KeywordList, MovieDetails, SearchResult, SearchResponse, TopRatedPage};

/// Default base URL of the public catalog API
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Read-only access to the external movie catalog.
///
/// `Send + Sync` so a single client can be shared by concurrent workers.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Search movies by title; results are in API relevance order.
    async fn search_movies(&self, query: &str) -> Result<Vec<SearchResult>>;

    async fn movie_details(&self, id: CatalogId) -> Result<MovieDetails>;

    async fn movie_keywords(&self, id: CatalogId) -> Result<KeywordList>;

    /// Fetch one page (1-based) of the "top rated" listing.
    async fn top_rated_page(&self, page: u32) -> Result<TopRatedPage>;
}

/// Configuration for [`TmdbClient`].
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub base_url: String,
    pub api_key: String,
}

impl TmdbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Catalog client backed by the TMDb v3 REST API.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl TmdbClient {
    /// Create a client from its configuration.
    ///
    /// # Errors
    /// Fails if the base URL does not parse or the HTTP client cannot be built.
    pub fn new(config: TmdbConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build catalog HTTP client")?;

        // Url::join replaces the last path segment unless the base ends in '/'
        let mut base = config.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("invalid catalog base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    fn endpoint(&self, path: &str, context: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| RecsError::transport(context, e))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T> {
        debug!(endpoint = url.path(), "catalog request");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RecsError::transport(context, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecsError::transport(
                context,
                format!("catalog returned status {status}: {body}"),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RecsError::transport(context, e))
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn search_movies(&self, query: &str) -> Result<Vec<SearchResult>> {
        let context = "movie search";
        let mut url = self.endpoint("search/movie", context)?;
        url.query_pairs_mut().append_pair("query", query);

        let response: SearchResponse = self.get_json(url, context).await?;
        Ok(response.results)
    }

    async fn movie_details(&self, id: CatalogId) -> Result<MovieDetails> {
        let context = format!("movie details failed for movie {id}");
        let url = self.endpoint(&format!("movie/{id}"), &context)?;
        self.get_json(url, &context).await
    }

    async fn movie_keywords(&self, id: CatalogId) -> Result<KeywordList> {
        let context = format!("movie keywords failed for movie {id}");
        let url = self.endpoint(&format!("movie/{id}/keywords"), &context)?;
        self.get_json(url, &context).await
    }

    async fn top_rated_page(&self, page: u32) -> Result<TopRatedPage> {
        let context = format!("top rated listing failed at page {page}");
        let mut url = self.endpoint("movie/top_rated", &context)?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        self.get_json(url, &context).await
    }
}
