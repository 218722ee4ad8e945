//! # Catalog Crate
//!
//! Client-side access to the external movie catalog, plus the data model and
//! error taxonomy shared by the rest of the workspace.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (MovieRecord, SimilarityResult, TopKQuery) and catalog API shapes
//! - **client**: The `CatalogApi` trait and its TMDb HTTP implementation
//! - **paginator**: Lazy walk over the paged "top rated" listing
//! - **enricher**: Detail + keyword reads composed into a `MovieRecord`
//! - **error**: Error types for the whole workspace
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use catalog::{CatalogPaginator, MetadataEnricher, TmdbClient, TmdbConfig};
//!
//! let catalog = Arc::new(TmdbClient::new(TmdbConfig::new(api_key))?);
//! let ids = CatalogPaginator::new(catalog.clone()).collect_all().await?;
//! let record = MetadataEnricher::new(catalog).enrich(ids[0]).await?;
//!
//! println!("{}: {}", record.title, record.keywords);
//! ```

// Public modules
pub mod client;
pub mod enricher;
pub mod error;
pub mod paginator;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use client::{CatalogApi, DEFAULT_BASE_URL, TmdbClient, TmdbConfig};
pub use enricher::{MAX_KEYWORDS, MetadataEnricher, top_keywords};
pub use error::{ErrorKind, RecsError, Result};
pub use paginator::CatalogPaginator;
pub use types::{
    // Type aliases
    CatalogId,
    EmbeddingVector,
    // Domain types
    MovieRecord,
    SimilarityResult,
    TopKQuery,
    // Catalog API shapes
    Keyword,
    KeywordList,
    ListedMovie,
    MovieDetails,
    SearchResult,
    TopRatedPage,
};
