//! Builds a [`MovieRecord`] from the catalog's detail and keyword endpoints.
//!
//! Both reads must succeed: a keyword failure discards the detail read and
//! fails the record.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::client::CatalogApi;
use crate::error::Result;
use crate::types::{CatalogId, Keyword, MovieRecord};

/// Default number of keywords kept per movie
pub const MAX_KEYWORDS: usize = 5;

/// Join the names of the first `limit` keywords, in API order.
pub fn top_keywords(keywords: &[Keyword], limit: usize) -> String {
    keywords
        .iter()
        .take(limit)
        .map(|keyword| keyword.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fetches and composes movie metadata for indexing.
#[derive(Clone)]
pub struct MetadataEnricher {
    catalog: Arc<dyn CatalogApi>,
    keyword_limit: usize,
}

impl MetadataEnricher {
    pub fn new(catalog: Arc<dyn CatalogApi>) -> Self {
        Self {
            catalog,
            keyword_limit: MAX_KEYWORDS,
        }
    }

    /// Configure how many keywords are kept (default: 5)
    pub fn with_keyword_limit(mut self, limit: usize) -> Self {
        self.keyword_limit = limit;
        self
    }

    #[instrument(skip(self))]
    pub async fn enrich(&self, id: CatalogId) -> Result<MovieRecord> {
        let details = self.catalog.movie_details(id).await?;
        let keyword_list = self.catalog.movie_keywords(id).await?;

        let keywords = top_keywords(&keyword_list.keywords, self.keyword_limit);
        debug!(title = %details.title, keywords = %keywords, "Enriched movie");

        Ok(MovieRecord {
            id,
            title: details.title,
            overview: details.overview,
            keywords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{CatalogCall, StubCatalog};

    fn keywords(names: &[&str]) -> Vec<Keyword> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Keyword {
                id: i as u64,
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_top_keywords_keeps_min_of_n_and_five_in_order() {
        let all = ["a", "b", "c", "d", "e", "f", "g"];
        for n in 0..=all.len() {
            let joined = top_keywords(&keywords(&all[..n]), MAX_KEYWORDS);
            let expected = all[..n.min(5)].join(", ");
            assert_eq!(joined, expected, "n = {n}");
        }
    }

    #[test]
    fn test_top_keywords_empty() {
        assert_eq!(top_keywords(&[], MAX_KEYWORDS), "");
    }

    #[tokio::test]
    async fn test_enrich_composes_record() {
        let stub = Arc::new(StubCatalog::new().with_movie(
            438631,
            "Dune",
            "...",
            &["sci-fi", "epic"],
        ));
        let enricher = MetadataEnricher::new(stub.clone());

        let record = enricher.enrich(438631).await.unwrap();

        assert_eq!(
            record,
            MovieRecord {
                id: 438631,
                title: "Dune".to_string(),
                overview: "...".to_string(),
                keywords: "sci-fi, epic".to_string(),
            }
        );
        assert_eq!(
            stub.calls(),
            vec![CatalogCall::Details(438631), CatalogCall::Keywords(438631)]
        );
    }

    #[tokio::test]
    async fn test_enrich_truncates_to_five_keywords() {
        let stub = Arc::new(StubCatalog::new().with_movie(
            27205,
            "Inception",
            "A thief who steals corporate secrets.",
            &["dream", "heist", "subconscious", "mind", "architecture", "paris"],
        ));
        let record = MetadataEnricher::new(stub).enrich(27205).await.unwrap();

        assert_eq!(record.keywords, "dream, heist, subconscious, mind, architecture");
    }

    #[tokio::test]
    async fn test_detail_failure_skips_keyword_read() {
        let stub = Arc::new(
            StubCatalog::new()
                .with_movie(1, "Broken", "", &["x"])
                .with_failing_details(1),
        );
        let err = MetadataEnricher::new(stub.clone()).enrich(1).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(stub.calls(), vec![CatalogCall::Details(1)]);
    }

    #[tokio::test]
    async fn test_keyword_failure_fails_whole_record() {
        let stub = Arc::new(
            StubCatalog::new()
                .with_movie(2, "No Keywords", "overview", &[])
                .with_failing_keywords(2),
        );
        let err = MetadataEnricher::new(stub).enrich(2).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("movie 2"));
    }
}
