//! Integration tests for the pipeline.
//!
//! These tests run an index build and then query the freshly built index,
//! with in-memory stand-ins for the catalog and the embedding service.

use std::sync::Arc;

use catalog::testing::StubCatalog;
use catalog::{CatalogPaginator, ErrorKind, MetadataEnricher};
use ml_client::testing::StubGateway;
use pipeline::{FailureStage, IndexBuilder, RecommendationResolver};
use tokio_util::sync::CancellationToken;

fn create_test_setup() -> (Arc<StubCatalog>, Arc<StubGateway>) {
    let catalog = StubCatalog::new()
        .with_pages(vec![vec![101, 102, 103, 104], vec![105, 106, 107, 108], vec![109, 110]])
        .with_movie(
            101,
            "The Shawshank Redemption",
            "Two imprisoned men bond over a number of years.",
            &["prison", "friendship", "hope", "escape", "corruption", "banker"],
        )
        .with_movie(102, "The Godfather", "An organized crime dynasty.", &["mafia", "family"])
        .with_movie(103, "The Godfather Part II", "The early life of Vito Corleone.", &["mafia"])
        .with_movie(104, "Schindler's List", "The true story of Oskar Schindler.", &["holocaust"])
        .with_movie(105, "12 Angry Men", "A jury deliberates.", &[])
        .with_search("Godfather", &[(102, "The Godfather"), (103, "The Godfather Part II")])
        .with_search("Shawshank", &[(101, "The Shawshank Redemption")])
        .with_failing_details(107);

    let gateway = StubGateway::new().with_failing_id(110);

    (Arc::new(catalog), Arc::new(gateway))
}

fn index_builder(catalog: &Arc<StubCatalog>, gateway: &Arc<StubGateway>) -> IndexBuilder {
    IndexBuilder::new(
        CatalogPaginator::new(catalog.clone()),
        MetadataEnricher::new(catalog.clone()),
        gateway.clone(),
    )
    .with_concurrency(3)
    .with_max_attempts(1)
}

#[tokio::test]
async fn test_build_then_recommend() {
    let (catalog, gateway) = create_test_setup();
    let cancel = CancellationToken::new();

    let report = index_builder(&catalog, &gateway).build(&cancel).await.unwrap();

    assert_eq!(report.listed, 10);
    assert_eq!(report.submitted, 8);
    assert_eq!(report.failed, 2);
    assert_eq!(report.submitted + report.failed, report.listed);

    let stages: Vec<(u32, FailureStage)> = report.failures.iter().map(|f| (f.id, f.stage)).collect();
    assert_eq!(stages, vec![(107, FailureStage::Enrich), (110, FailureStage::Submit)]);

    let resolver = RecommendationResolver::new(catalog.clone(), gateway.clone());
    let neighbors = resolver.resolve("Godfather", 3, &cancel).await.unwrap();

    // Closest indexed ids to 102; 107 and 110 never made it into the index
    let ids: Vec<u32> = neighbors.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![101, 103, 104]);
    assert_eq!(neighbors[1].title, "The Godfather Part II");
}

#[tokio::test]
async fn test_indexed_records_carry_enriched_metadata() {
    let (catalog, gateway) = create_test_setup();

    index_builder(&catalog, &gateway)
        .build(&CancellationToken::new())
        .await
        .unwrap();

    let shawshank = gateway.stored_record(101).unwrap();
    assert_eq!(shawshank.title, "The Shawshank Redemption");
    assert_eq!(shawshank.keywords, "prison, friendship, hope, escape, corruption");

    let angry_men = gateway.stored_record(105).unwrap();
    assert_eq!(angry_men.keywords, "");

    assert!(gateway.stored_record(107).is_none());
}

#[tokio::test]
async fn test_partial_build_surfaces_as_error() {
    let (catalog, gateway) = create_test_setup();

    let report = index_builder(&catalog, &gateway)
        .build(&CancellationToken::new())
        .await
        .unwrap();
    let err = report.into_result().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    assert_eq!(err.to_string(), "2 of 10 movies failed to index");
}

#[tokio::test]
async fn test_query_before_build_is_not_indexed() {
    let (catalog, gateway) = create_test_setup();
    let resolver = RecommendationResolver::new(catalog.clone(), gateway.clone());

    let err = resolver
        .resolve("Shawshank", 5, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("101"));
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let (catalog, gateway) = create_test_setup();
    let builder = index_builder(&catalog, &gateway);
    let cancel = CancellationToken::new();

    let first = builder.build(&cancel).await.unwrap();
    let stored_after_first = gateway.stored_ids();
    let second = builder.build(&cancel).await.unwrap();

    assert_eq!(first.submitted, second.submitted);
    assert_eq!(gateway.stored_ids(), stored_after_first);
}
