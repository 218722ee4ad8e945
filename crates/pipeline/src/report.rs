//! Outcome of an index build run.

use std::fmt;
use std::time::Duration;

use catalog::{CatalogId, RecsError, Result};

/// Which per-item step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Enrich,
    Submit,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Enrich => write!(f, "enrich"),
            FailureStage::Submit => write!(f, "submit"),
        }
    }
}

/// One identifier that could not be indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: CatalogId,
    pub stage: FailureStage,
    pub reason: String,
}

/// Summary of an index build run.
///
/// `submitted + failed == listed` always holds; `failures` is in listing
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Identifiers yielded by the paginator
    pub listed: usize,
    /// Records whose enrichment succeeded (submitted or not)
    pub enriched: usize,
    pub submitted: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    /// Turn a report with failures into [`RecsError::PartialFailure`].
    pub fn into_result(self) -> Result<BuildReport> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(RecsError::PartialFailure {
                failed: self.failed,
                total: self.listed,
            })
        }
    }
}

/// Per-item result sent back from a worker to the aggregating loop.
#[derive(Debug)]
pub(crate) struct ItemOutcome {
    pub(crate) position: usize,
    pub(crate) id: CatalogId,
    pub(crate) failure: Option<(FailureStage, String)>,
}

/// Folds worker outcomes into a [`BuildReport`]. Owned by a single loop,
/// so no synchronization is needed.
#[derive(Debug, Default)]
pub(crate) struct ReportCollector {
    listed: usize,
    enriched: usize,
    submitted: usize,
    failures: Vec<(usize, ItemFailure)>,
}

impl ReportCollector {
    pub(crate) fn listed(&mut self) -> usize {
        let position = self.listed;
        self.listed += 1;
        position
    }

    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        match outcome.failure {
            None => {
                self.enriched += 1;
                self.submitted += 1;
            }
            Some((stage, reason)) => {
                if stage == FailureStage::Submit {
                    self.enriched += 1;
                }
                self.failures.push((
                    outcome.position,
                    ItemFailure {
                        id: outcome.id,
                        stage,
                        reason,
                    },
                ));
            }
        }
    }

    pub(crate) fn finish(mut self, elapsed: Duration) -> BuildReport {
        self.failures.sort_by_key(|(position, _)| *position);
        let failures: Vec<ItemFailure> = self.failures.into_iter().map(|(_, f)| f).collect();
        BuildReport {
            listed: self.listed,
            enriched: self.enriched,
            submitted: self.submitted,
            failed: failures.len(),
            failures,
            elapsed,
        }
    }
}
