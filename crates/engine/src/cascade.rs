// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion cascade: release children whose parents have all succeeded.

use crate::release::{release, Release};
use graft_adapters::{DispatchError, Dispatcher};
use graft_core::{Clock, Job, JobId, JobStatus, TriggerContext};
use graft_storage::{Store, StoreError};

/// What one cascade run did.
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    pub dispatched: Vec<JobId>,
    /// Children with at least one parent not (yet) succeeded
    pub waiting: Vec<JobId>,
    /// Children whose dispatch failed; they stay `Created`
    pub failed: Vec<(JobId, DispatchError)>,
}

/// Run the cascade for `job`, which has just succeeded.
///
/// Parent statuses are re-read from the store for every child at decision
/// time. Siblings can finish in any order on other workers, so nothing read
/// earlier is trusted. Safe to run more than once for the same job: the
/// conditional claim in [`release`] admits one dispatch per child.
pub async fn on_job_succeeded<S, D, C>(
    store: &S,
    dispatcher: &D,
    clock: &C,
    job: &Job,
    trigger: &TriggerContext,
) -> Result<CascadeOutcome, StoreError>
where
    S: Store,
    D: Dispatcher,
    C: Clock,
{
    let mut outcome = CascadeOutcome::default();
    let mut children: Vec<JobId> = Vec::new();
    for link in store.links_by_parent(&job.id)? {
        if !children.contains(&link.child) {
            children.push(link.child);
        }
    }

    for child_id in children {
        let Some(child) = store.job(&child_id)? else {
            tracing::warn!(parent = %job.id, child = %child_id, "linked child job missing");
            continue;
        };
        if child.status != JobStatus::Created {
            continue;
        }

        let mut blocker = None;
        for link in store.links_by_child(&child_id)? {
            let status = store.job(&link.parent)?.map(|p| p.status);
            if status != Some(JobStatus::Succeeded) {
                blocker = Some((link.parent, status));
                break;
            }
        }
        if let Some((parent, status)) = blocker {
            match status {
                Some(JobStatus::Failed) => tracing::info!(
                    child = %child_id,
                    project = %child.project,
                    %parent,
                    "parent failed, child will not run"
                ),
                _ => tracing::debug!(
                    child = %child_id,
                    project = %child.project,
                    %parent,
                    "waiting on parent"
                ),
            }
            outcome.waiting.push(child_id);
            continue;
        }

        match release(store, dispatcher, clock, &child, trigger).await? {
            Release::Dispatched => outcome.dispatched.push(child_id),
            Release::AlreadyClaimed => {}
            Release::Failed(e) => outcome.failed.push((child_id, e)),
        }
    }
    Ok(outcome)
}

#[cfg(test)]
#[path = "cascade_tests.rs"]
mod tests;
