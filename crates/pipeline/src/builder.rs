//! # Index Builder
//!
//! Drives the whole index build:
//! 1. List every catalog identifier (CatalogPaginator)
//! 2. Enrich each identifier into a MovieRecord (MetadataEnricher)
//! 3. Submit each record to the embedding service (EmbeddingGateway)
//! 4. Aggregate per-item outcomes into a BuildReport
//!
//! Per-item failures are recorded and the run moves on. Only a paginator
//! failure, a crashed worker or cancellation ends the run early.
//!
//! ## Concurrency
//! Items are fanned out to a `JoinSet` with at most `concurrency` tasks in
//! flight, in listing order. Outcomes are fanned back in by the loop that
//! owns the `ReportCollector`.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use catalog::{CatalogId, CatalogPaginator, ErrorKind, MetadataEnricher, RecsError, Result};
use ml_client::EmbeddingGateway;

use crate::report::{BuildReport, FailureStage, ItemOutcome, ReportCollector};

/// Default number of identifiers processed concurrently
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Builds the similarity index from the catalog.
#[derive(Clone)]
pub struct IndexBuilder {
    paginator: CatalogPaginator,
    enricher: MetadataEnricher,
    gateway: Arc<dyn EmbeddingGateway>,
    concurrency: usize,
    max_attempts: usize,
    retry_backoff: Duration,
}

impl IndexBuilder {
    pub fn new(
        paginator: CatalogPaginator,
        enricher: MetadataEnricher,
        gateway: Arc<dyn EmbeddingGateway>,
    ) -> Self {
        Self {
            paginator,
            enricher,
            gateway,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: 1,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Configure the worker pool size (default: 4, minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Configure attempts per step for transport failures (default: 1, no retry)
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Configure the pause between attempts (default: 500ms)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Run a full index build.
    ///
    /// # Returns
    /// * `Ok(BuildReport)` - every listed identifier was attempted; the
    ///   report may still contain per-item failures
    /// * `Err(Transport)` - the catalog listing itself failed
    /// * `Err(Cancelled)` - `cancel` fired; queued work was dropped and
    ///   in-flight work aborted
    pub async fn build(&self, cancel: &CancellationToken) -> Result<BuildReport> {
        let start_time = Instant::now();
        info!(
            "Starting index build (concurrency: {}, max attempts: {})",
            self.concurrency, self.max_attempts
        );

        let mut ids = pin!(self.paginator.list_all_identifiers());
        let mut tasks: JoinSet<ItemOutcome> = JoinSet::new();
        let mut collector = ReportCollector::default();

        loop {
            // Wait for a free worker slot
            while tasks.len() >= self.concurrency {
                let joined = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(abort(&mut tasks)),
                    Some(joined) = tasks.join_next() => joined,
                };
                collector.record(worker_outcome(joined, &mut tasks)?);
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(abort(&mut tasks)),
                next = ids.next() => next,
            };

            match next {
                None => break,
                Some(Err(e)) => {
                    error!("Catalog listing failed, aborting build: {}", e);
                    tasks.abort_all();
                    return Err(e);
                }
                Some(Ok(id)) => {
                    let position = collector.listed();
                    tasks.spawn(self.index_one(position, id));
                }
            }
        }

        while !tasks.is_empty() {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(abort(&mut tasks)),
                Some(joined) = tasks.join_next() => joined,
            };
            collector.record(worker_outcome(joined, &mut tasks)?);
        }

        let report = collector.finish(start_time.elapsed());
        info!(
            "Index build finished: listed={}, enriched={}, submitted={}, failed={} in {:.2?}",
            report.listed, report.enriched, report.submitted, report.failed, report.elapsed
        );
        Ok(report)
    }

    /// Enrich and submit one identifier. Never fails: errors become part
    /// of the outcome.
    fn index_one(&self, position: usize, id: CatalogId) -> impl Future<Output = ItemOutcome> + Send + 'static {
        let enricher = self.enricher.clone();
        let gateway = Arc::clone(&self.gateway);
        let max_attempts = self.max_attempts;
        let backoff = self.retry_backoff;

        async move {
            let failure = async {
                let record = with_retries(max_attempts, backoff, id, FailureStage::Enrich, || {
                    enricher.enrich(id)
                })
                .await
                .map_err(|e| (FailureStage::Enrich, e))?;

                with_retries(max_attempts, backoff, id, FailureStage::Submit, || {
                    gateway.generate_embedding(&record)
                })
                .await
                .map_err(|e| (FailureStage::Submit, e))?;

                debug!("Submitted movie {} ({:?})", id, record.title);
                Ok::<(), (FailureStage, RecsError)>(())
            }
            .await
            .err()
            .map(|(stage, e)| {
                warn!("Failed to index movie {} at {} stage: {}", id, stage, e);
                (stage, e.to_string())
            });

            ItemOutcome {
                position,
                id,
                failure,
            }
        }
    }
}

/// Retry `op` on transport errors, up to `max_attempts` tries in total.
async fn with_retries<T, F, Fut>(
    max_attempts: usize,
    backoff: Duration,
    id: CatalogId,
    stage: FailureStage,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.kind() == ErrorKind::Transport => {
                debug!(
                    "Attempt {}/{} to {} movie {} failed: {}",
                    attempt, max_attempts, stage, id, e
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn abort(tasks: &mut JoinSet<ItemOutcome>) -> RecsError {
    warn!("Index build cancelled with {} movies in flight", tasks.len());
    tasks.abort_all();
    RecsError::Cancelled
}

fn worker_outcome(
    joined: std::result::Result<ItemOutcome, JoinError>,
    tasks: &mut JoinSet<ItemOutcome>,
) -> Result<ItemOutcome> {
    joined.map_err(|e| {
        error!("Index worker crashed: {}", e);
        tasks.abort_all();
        RecsError::transport("index worker", e)
    })
}
