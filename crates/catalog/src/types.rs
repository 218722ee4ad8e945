//! Core domain types for the recommendation client.
//!
//! This module defines the records that flow between the catalog, the
//! pipeline and the embedding service, plus the JSON shapes returned by the
//! external catalog API.

use serde::{Deserialize, Serialize};

use crate::error::{RecsError, Result};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a catalog entry
pub type CatalogId = u32;

/// Embedding payload; never inspected by this crate
pub type EmbeddingVector = Vec<f32>;

// =============================================================================
// Domain Types
// =============================================================================

/// Canonical movie record submitted to the embedding service.
///
/// `keywords` holds at most [`crate::MAX_KEYWORDS`] tag names joined by `", "`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: CatalogId,
    pub title: String,
    pub overview: String,
    pub keywords: String,
}

/// One neighbor returned by the similarity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub id: CatalogId,
    pub title: String,
}

/// Request for the `limit` nearest neighbors of `id`.
///
/// The constructor rejects `limit == 0`; any upper bound is left to the
/// remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKQuery {
    id: CatalogId,
    limit: u32,
}

impl TopKQuery {
    pub fn new(id: CatalogId, limit: u32) -> Result<Self> {
        if limit == 0 {
            return Err(RecsError::InvalidArgument(
                "limit must be greater than zero".to_string(),
            ));
        }
        Ok(Self { id, limit })
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

// =============================================================================
// Catalog API Shapes
// =============================================================================

/// One hit from the title search endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchResult {
    pub id: CatalogId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub release_date: String,
}

/// Envelope of the title search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Subset of the movie detail endpoint this client needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MovieDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Keyword {
    pub id: u64,
    pub name: String,
}

/// Response of the keyword endpoint; keywords are in API order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordList {
    pub id: CatalogId,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ListedMovie {
    pub id: CatalogId,
}

/// One page of the "top rated" listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopRatedPage {
    pub page: u32,
    #[serde(default)]
    pub results: Vec<ListedMovie>,
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}
