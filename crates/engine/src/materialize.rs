// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job materialization: persist the reduced graph as a DAG of jobs.

use crate::error::SchedulerError;
use crate::traverse::traverse_parents_first;
use graft_core::{Batch, BatchMeta, Clock, Job, JobParentLink, ProjectGraph, WorkItem};
use graft_storage::Store;
use indexmap::IndexMap;
use std::collections::HashMap;

/// A freshly persisted batch and its jobs keyed by project.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub batch: Batch,
    /// Jobs in parent-first order
    pub jobs: IndexMap<String, Job>,
    pub links: Vec<JobParentLink>,
}

/// Create the batch and one job per project of `reduced`.
///
/// Projects are visited parent-first; each job is written together with the
/// links to its parents' jobs in a single store call, so a crash never leaves
/// a job without its parent links. A store failure stops materialization and
/// is returned; rows written for earlier projects stay in the store.
pub fn materialize<S: Store, C: Clock>(
    store: &S,
    clock: &C,
    reduced: &ProjectGraph,
    work_items: &HashMap<String, WorkItem>,
    meta: BatchMeta,
) -> Result<Materialized, SchedulerError> {
    check_work_items(reduced, work_items)?;

    let batch = Batch::new(meta, clock.epoch_ms());
    store.insert_batch(batch.clone())?;
    tracing::info!(
        batch_id = %batch.id,
        repo = %batch.trigger.repo(),
        command = %batch.trigger.command,
        projects = reduced.len(),
        "batch created"
    );

    let mut jobs: IndexMap<String, Job> = IndexMap::with_capacity(reduced.len());
    let mut links = Vec::with_capacity(reduced.edge_count());
    let mut failure: Option<SchedulerError> = None;

    traverse_parents_first(reduced, |name| {
        if failure.is_some() {
            return false;
        }
        let (Some(project), Some(work_item)) = (reduced.project(name), work_items.get(name)) else {
            return false;
        };
        let job = Job::new(
            batch.id.clone(),
            name,
            work_item.clone(),
            &project.workflow_file,
            clock.epoch_ms(),
        );
        // Parents are always visited first, so their jobs exist
        let parents: Vec<JobParentLink> = reduced
            .predecessors(name)
            .filter_map(|parent| jobs.get(parent))
            .map(|parent| JobParentLink::new(parent.id.clone(), job.id.clone()))
            .collect();

        if let Err(e) = store.insert_job(job.clone(), parents.clone()) {
            tracing::error!(
                batch_id = %batch.id,
                project = name,
                error = %e,
                "failed to persist job"
            );
            failure = Some(e.into());
            return false;
        }
        tracing::debug!(batch_id = %batch.id, job_id = %job.id, project = name, "job created");
        for link in &parents {
            tracing::debug!(parent = %link.parent, child = %link.child, "job linked");
        }
        links.extend(parents);
        jobs.insert(name.to_string(), job);
        true
    });

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(Materialized { batch, jobs, links })
}

/// Every project of `reduced` needs a work item.
pub(crate) fn check_work_items(
    reduced: &ProjectGraph,
    work_items: &HashMap<String, WorkItem>,
) -> Result<(), SchedulerError> {
    match reduced.names().find(|name| !work_items.contains_key(*name)) {
        Some(missing) => Err(SchedulerError::MissingWorkItem(missing.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "materialize_tests.rs"]
mod tests;
