//! In-memory [`EmbeddingGateway`] for tests.
//!
//! Behaves like an idempotent keyed store: submitting a record upserts it by
//! id. Neighbors are either canned per id or ranked by id distance over the
//! stored records. Calls are recorded and in-flight concurrency is tracked.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use catalog::{CatalogId, EmbeddingVector, MovieRecord, RecsError, Result, SimilarityResult, TopKQuery};

use crate::EmbeddingGateway;

/// One recorded request against [`StubGateway`]
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Generate(CatalogId),
    Store(CatalogId),
    NearestOne(CatalogId),
    NearestK { id: CatalogId, limit: u32 },
}

#[derive(Debug, Default)]
pub struct StubGateway {
    canned: HashMap<CatalogId, Vec<SimilarityResult>>,
    failing_ids: HashSet<CatalogId>,
    fail_first_attempts: HashMap<CatalogId, usize>,
    latency: Option<Duration>,
    stored: Mutex<BTreeMap<CatalogId, MovieRecord>>,
    attempts: Mutex<HashMap<CatalogId, usize>>,
    calls: Mutex<Vec<GatewayCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned neighbor list for `id`, returned (truncated to the limit) by
    /// the neighbor operations.
    pub fn with_neighbors(mut self, id: CatalogId, neighbors: &[(CatalogId, &str)]) -> Self {
        let neighbors = neighbors
            .iter()
            .map(|&(id, title)| SimilarityResult {
                id,
                title: title.to_string(),
            })
            .collect();
        self.canned.insert(id, neighbors);
        self
    }

    /// Every operation on `id` fails with a transport error.
    pub fn with_failing_id(mut self, id: CatalogId) -> Self {
        self.failing_ids.insert(id);
        self
    }

    /// The first `attempts` submissions of `id` fail, later ones succeed.
    pub fn with_transient_failures(mut self, id: CatalogId, attempts: usize) -> Self {
        self.fail_first_attempts.insert(id, attempts);
        self
    }

    /// Delay every call, to make concurrency and cancellation observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn neighbor_fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, GatewayCall::NearestOne(_) | GatewayCall::NearestK { .. }))
            .count()
    }

    /// Ids currently stored, ascending
    pub fn stored_ids(&self) -> Vec<CatalogId> {
        self.stored
            .lock()
            .map(|stored| stored.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn stored_record(&self, id: CatalogId) -> Option<MovieRecord> {
        self.stored.lock().ok().and_then(|stored| stored.get(&id).cloned())
    }

    /// Highest number of calls observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: GatewayCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check(&self, operation: &str, id: CatalogId) -> Result<()> {
        if self.failing_ids.contains(&id) {
            return Err(RecsError::for_movie(operation, id, "status: Unavailable, stub failure"));
        }
        Ok(())
    }

    fn check_transient(&self, id: CatalogId) -> Result<()> {
        let Some(&failures) = self.fail_first_attempts.get(&id) else {
            return Ok(());
        };
        let attempt = match self.attempts.lock() {
            Ok(mut attempts) => {
                let count = attempts.entry(id).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => return Ok(()),
        };
        if attempt <= failures {
            return Err(RecsError::for_movie(
                "GetMovieEmbedding",
                id,
                format!("status: Unavailable, transient failure {attempt}"),
            ));
        }
        Ok(())
    }

    fn ranked(&self, id: CatalogId, limit: usize) -> Result<Vec<SimilarityResult>> {
        if let Some(canned) = self.canned.get(&id) {
            return Ok(canned.iter().take(limit).cloned().collect());
        }
        let stored = self
            .stored
            .lock()
            .map_err(|_| RecsError::transport("stub gateway", "poisoned"))?;
        if !stored.contains_key(&id) {
            return Err(RecsError::for_movie(
                "GetSimilarMovies",
                id,
                "status: NotFound, movie is not indexed",
            ));
        }
        let mut neighbors: Vec<SimilarityResult> = stored
            .values()
            .filter(|record| record.id != id)
            .map(|record| SimilarityResult {
                id: record.id,
                title: record.title.clone(),
            })
            .collect();
        neighbors.sort_by_key(|n| (n.id.abs_diff(id), n.id));
        neighbors.truncate(limit);
        Ok(neighbors)
    }
}

#[async_trait]
impl EmbeddingGateway for StubGateway {
    async fn generate_embedding(&self, record: &MovieRecord) -> Result<EmbeddingVector> {
        self.record(GatewayCall::Generate(record.id));
        self.enter().await;
        let result = self
            .check("GetMovieEmbedding", record.id)
            .and_then(|_| self.check_transient(record.id))
            .and_then(|_| {
                self.stored
                    .lock()
                    .map_err(|_| RecsError::transport("stub gateway", "poisoned"))?
                    .insert(record.id, record.clone());
                Ok(vec![record.id as f32, record.keywords.len() as f32])
            });
        self.leave();
        result
    }

    async fn store_embedding(&self, id: CatalogId, embedding: EmbeddingVector) -> Result<String> {
        self.record(GatewayCall::Store(id));
        self.check("AddMovieEmbedding", id)?;
        Ok(format!("stored {} values for movie {}", embedding.len(), id))
    }

    async fn nearest_one(&self, id: CatalogId) -> Result<SimilarityResult> {
        self.record(GatewayCall::NearestOne(id));
        self.check("GetSimilarMovie", id)?;
        self.ranked(id, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| RecsError::for_movie("GetSimilarMovie", id, "status: NotFound, no neighbors"))
    }

    async fn nearest_k(&self, query: TopKQuery) -> Result<Vec<SimilarityResult>> {
        let id = query.id();
        self.record(GatewayCall::NearestK {
            id,
            limit: query.limit(),
        });
        self.check("GetSimilarMovies", id)?;
        self.ranked(id, query.limit() as usize)
    }
}
