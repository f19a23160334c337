// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Releasing a job to the dispatcher exactly once.

use graft_adapters::{DispatchError, Dispatcher};
use graft_core::{Clock, Job, JobStatus, TriggerContext};
use graft_storage::{Store, StoreError};

/// Outcome of trying to release one job.
#[derive(Debug)]
pub enum Release {
    /// This caller claimed the job and the dispatcher accepted it
    Dispatched,
    /// The job was no longer `Created`; someone else claimed it
    AlreadyClaimed,
    /// The dispatcher failed; the claim was rolled back to `Created`
    Failed(DispatchError),
}

/// Claim `job` with a conditional `Created → Triggered` write, then dispatch.
///
/// Of several concurrent callers at most one wins the claim. When dispatch
/// fails the claim is undone with the reverse conditional write so the job
/// stays `Created` and a later trigger can release it again. That rollback is
/// the only backwards status move and only undoes this caller's own claim.
pub async fn release<S, D, C>(
    store: &S,
    dispatcher: &D,
    clock: &C,
    job: &Job,
    trigger: &TriggerContext,
) -> Result<Release, StoreError>
where
    S: Store,
    D: Dispatcher,
    C: Clock,
{
    let claimed = store.transition_job_status(
        &job.id,
        JobStatus::Created,
        JobStatus::Triggered,
        clock.epoch_ms(),
    )?;
    if !claimed {
        tracing::debug!(job_id = %job.id, project = %job.project, "job already claimed");
        return Ok(Release::AlreadyClaimed);
    }

    let mut triggered = job.clone();
    triggered.status = JobStatus::Triggered;
    match dispatcher.dispatch(&triggered, trigger).await {
        Ok(()) => {
            tracing::info!(
                batch_id = %job.batch_id,
                job_id = %job.id,
                project = %job.project,
                workflow = %job.workflow_file,
                "job dispatched"
            );
            Ok(Release::Dispatched)
        }
        Err(e) => {
            tracing::error!(
                job_id = %job.id,
                project = %job.project,
                error = %e,
                "dispatch failed"
            );
            let restored = store.transition_job_status(
                &job.id,
                JobStatus::Triggered,
                JobStatus::Created,
                clock.epoch_ms(),
            )?;
            if !restored {
                tracing::warn!(job_id = %job.id, "job moved on before dispatch rollback");
            }
            Ok(Release::Failed(e))
        }
    }
}

#[cfg(test)]
#[path = "release_tests.rs"]
mod tests;
