//! Resolves a free-text title to recommendations.
//!
//! The first search hit is authoritative: no fuzzy ranking or
//! disambiguation between remakes. Neighbors come back exactly as ranked by
//! the embedding service.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use catalog::{CatalogApi, CatalogId, RecsError, Result, SimilarityResult, TopKQuery};
use ml_client::EmbeddingGateway;

#[derive(Clone)]
pub struct RecommendationResolver {
    catalog: Arc<dyn CatalogApi>,
    gateway: Arc<dyn EmbeddingGateway>,
}

impl RecommendationResolver {
    pub fn new(catalog: Arc<dyn CatalogApi>, gateway: Arc<dyn EmbeddingGateway>) -> Self {
        Self { catalog, gateway }
    }

    /// Top `limit` movies similar to the first search hit for `title_query`.
    ///
    /// Input is validated before any network call: a blank query or a zero
    /// limit fails with `InvalidArgument`.
    #[instrument(skip(self, cancel))]
    pub async fn resolve(
        &self,
        title_query: &str,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<SimilarityResult>> {
        validate_query(title_query)?;
        if limit == 0 {
            return Err(RecsError::InvalidArgument(
                "limit must be greater than zero".to_string(),
            ));
        }

        let id = self.resolve_id(title_query, cancel).await?;
        let query = TopKQuery::new(id, limit)?;
        let neighbors = cancellable(cancel, self.gateway.nearest_k(query)).await?;

        info!(
            "Resolved {:?} to movie {} with {} recommendations",
            title_query,
            id,
            neighbors.len()
        );
        Ok(neighbors)
    }

    /// Catalog identifier of the first search hit for `title_query`.
    pub async fn resolve_id(&self, title_query: &str, cancel: &CancellationToken) -> Result<CatalogId> {
        validate_query(title_query)?;

        let results = cancellable(cancel, self.catalog.search_movies(title_query)).await?;
        debug!("Search for {:?} returned {} results", title_query, results.len());

        results
            .first()
            .map(|hit| hit.id)
            .ok_or_else(|| RecsError::NotFound(title_query.to_string()))
    }

    /// The single most similar movie to the first search hit.
    #[instrument(skip(self, cancel))]
    pub async fn most_similar(&self, title_query: &str, cancel: &CancellationToken) -> Result<SimilarityResult> {
        let id = self.resolve_id(title_query, cancel).await?;
        cancellable(cancel, self.gateway.nearest_one(id)).await
    }
}

fn validate_query(title_query: &str) -> Result<()> {
    if title_query.trim().is_empty() {
        return Err(RecsError::InvalidArgument(
            "movie title must not be blank".to_string(),
        ));
    }
    Ok(())
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RecsError::Cancelled),
        result = fut => result,
    }
}
