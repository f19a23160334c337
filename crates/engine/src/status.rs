// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch status aggregation.

use crate::error::SchedulerError;
use graft_core::{Batch, BatchId, BatchStatus, Job};
use graft_storage::Store;

/// A batch together with the job statuses its status was derived from.
#[derive(Debug, Clone)]
pub struct BatchRollup {
    pub batch: Batch,
    pub jobs: Vec<Job>,
    /// Stored status before this recompute
    pub previous: BatchStatus,
}

impl BatchRollup {
    pub fn changed(&self) -> bool {
        self.batch.status != self.previous
    }

    /// Whether this recompute moved the batch into `Succeeded`.
    pub fn just_succeeded(&self) -> bool {
        self.changed() && self.batch.status == BatchStatus::Succeeded
    }
}

/// Re-derive the status of `batch_id` from its jobs and persist a change.
///
/// Terminal statuses are sticky: a `Succeeded` or `Failed` batch is returned
/// as stored. Job statuses only move forward, so a stale read can at worst
/// derive `Running` for a batch another caller just finished, and `Running`
/// is never written over a terminal status.
pub fn recompute<S: Store>(store: &S, batch_id: &BatchId) -> Result<BatchRollup, SchedulerError> {
    let mut batch =
        store.batch(batch_id)?.ok_or_else(|| SchedulerError::UnknownBatch(batch_id.clone()))?;
    let jobs = store.jobs_for_batch(batch_id)?;
    let previous = batch.status;
    if previous.is_terminal() {
        return Ok(BatchRollup { batch, jobs, previous });
    }

    let derived = BatchStatus::derive_from_jobs(&jobs);
    if derived != previous {
        store.set_batch_status(batch_id, derived)?;
        batch.status = derived;
        tracing::info!(
            batch_id = %batch_id,
            from = %previous,
            to = %derived,
            jobs = jobs.len(),
            "batch status changed"
        );
    }
    Ok(BatchRollup { batch, jobs, previous })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
