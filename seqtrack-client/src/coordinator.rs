//! Client-side bulk operations
//!
//! Every bulk request is validated as a whole first; a rejected request sends
//! nothing. Valid requests fan out one optimistic single-sample mutation per
//! target through the sample synchronizer, so each item snapshots, applies and
//! settles independently of its siblings.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use seqtrack_common::bulk::{self, DEFAULT_MAX_CONCURRENCY};
use seqtrack_common::models::{
    BatchReport, BulkOperationRequest, FailedItem, Sample, SampleId, SamplePatch, SampleStatus,
};
use seqtrack_common::status::next_status;
use seqtrack_common::{time, MutationError, Result, SampleStore};

use crate::sync::CacheSynchronizer;

/// Failure code for `advance` targets already at the end of the workflow
pub const TERMINAL_STATUS: &str = "terminal_status";

/// Failure code for `advance` targets whose status is unknown locally
pub const NOT_CACHED: &str = "not_cached";

/// Fans bulk operations out through the sample synchronizer
pub struct BulkOperationCoordinator {
    store: Arc<dyn SampleStore>,
    samples: Arc<CacheSynchronizer<Sample>>,
    max_concurrency: usize,
}

impl BulkOperationCoordinator {
    pub fn new(store: Arc<dyn SampleStore>, samples: Arc<CacheSynchronizer<Sample>>) -> Self {
        Self {
            store,
            samples,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Bound the number of mutations in flight (minimum 1)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Validate `request`, then apply its patch to every target
    ///
    /// # Errors
    /// `Error::Validation` when the request is rejected; no mutation is sent.
    /// Per-item failures never surface here: they are listed in the report.
    pub async fn execute(&self, request: &BulkOperationRequest) -> Result<BatchReport> {
        let validated = bulk::validate(request)?;
        let patch = validated.patch();
        let kind = validated.kind();

        debug!(
            operation = %kind,
            targets = validated.target_ids.len(),
            "Dispatching bulk operation"
        );

        let report = bulk::dispatch(validated.target_ids, self.max_concurrency, |id| {
            self.update_one(id, patch.clone())
        })
        .await;

        info!(operation = %kind, "Bulk operation settled: {}", report.summary());
        Ok(report)
    }

    /// Move every target one step forward in the workflow
    ///
    /// Targets whose cached status is terminal, or which are not cached at
    /// all, are reported as failed with `terminal_status` / `not_cached`.
    pub async fn advance(&self, ids: impl IntoIterator<Item = SampleId>) -> BatchReport {
        let mut seen = HashSet::new();
        let mut skipped = Vec::new();
        let mut planned: Vec<(SampleId, SampleStatus)> = Vec::new();

        for id in ids.into_iter().filter(|id| seen.insert(*id)) {
            match self.samples.get(id).await {
                None => skipped.push(FailedItem {
                    id,
                    error: NOT_CACHED.to_string(),
                    message: format!("sample {} is not cached", id),
                }),
                Some(sample) => match next_status(Some(sample.status)) {
                    Some(next) => planned.push((id, next)),
                    None => skipped.push(FailedItem {
                        id,
                        error: TERMINAL_STATUS.to_string(),
                        message: format!("sample {} has no status after {}", id, sample.status),
                    }),
                },
            }
        }

        let targets: Vec<SampleId> = planned.iter().map(|(id, _)| *id).collect();
        let mut report = bulk::dispatch(targets, self.max_concurrency, |id| {
            let status = planned
                .iter()
                .find(|(target, _)| *target == id)
                .map(|(_, status)| *status);
            async move {
                match status {
                    Some(status) => self.set_status(id, status).await,
                    None => Err(MutationError::Invalid(format!("sample {} was not planned", id))),
                }
            }
        })
        .await;

        report.failed.extend(skipped);
        info!("Advance settled: {}", report.summary());
        report
    }

    async fn update_one(
        &self,
        id: SampleId,
        patch: SamplePatch,
    ) -> std::result::Result<Sample, MutationError> {
        let store = self.store.clone();
        let optimistic = patch.clone();
        self.samples
            .mutate(
                id,
                move |sample| optimistic.apply(sample, time::now()),
                async move { store.update_sample(id, &patch).await },
            )
            .await
            .map_err(MutationError::from)
    }

    async fn set_status(
        &self,
        id: SampleId,
        status: SampleStatus,
    ) -> std::result::Result<Sample, MutationError> {
        let store = self.store.clone();
        self.samples
            .mutate(
                id,
                move |sample| SamplePatch::status(status).apply(sample, time::now()),
                async move { store.update_sample_status(id, status).await },
            )
            .await
            .map_err(MutationError::from)
    }
}
