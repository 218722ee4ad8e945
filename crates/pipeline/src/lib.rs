//! Index-build and query-resolution flows of the recommendation client.
//!
//! This crate provides:
//! - IndexBuilder, which walks the catalog and submits every movie to the
//!   embedding service
//! - BuildReport, the per-run summary with per-item failures
//! - RecommendationResolver, which turns a title into ranked neighbors
//!
//! ## Architecture
//! Both flows share the embedding gateway and nothing else:
//! 1. Build: CatalogPaginator → MetadataEnricher → EmbeddingGateway
//! 2. Query: title search → EmbeddingGateway
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{IndexBuilder, RecommendationResolver};
//!
//! let builder = IndexBuilder::new(paginator, enricher, gateway.clone())
//!     .with_concurrency(8);
//! let report = builder.build(&cancel).await?;
//!
//! let resolver = RecommendationResolver::new(catalog, gateway);
//! let neighbors = resolver.resolve("Dune", 5, &cancel).await?;
//! ```

pub mod builder;
pub mod report;
pub mod resolver;

// Re-export main types
pub use builder::{DEFAULT_CONCURRENCY, IndexBuilder};
pub use report::{BuildReport, FailureStage, ItemFailure};
pub use resolver::RecommendationResolver;
