// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler facade: the entry points called by event handlers and by the
//! execution layer.
//!
//! The scheduler is stateless apart from its configuration. Every decision
//! reads the [`Store`] and every transition is a short store call, so any
//! number of scheduler instances can share one store.

use crate::cascade::on_job_succeeded;
use crate::error::{LockConflict, SchedulerError};
use crate::locks::{lock_action, Acquired, LockAction, ResourceLocks};
use crate::materialize::{check_work_items, materialize};
use crate::reduce::reduce;
use crate::release::{release, Release};
use crate::status::recompute;
use graft_adapters::{AutoMerger, DispatchError, Dispatcher, ImpactDetector, Notifier};
use graft_config::{ConfigProvider, RepoConfig};
use graft_core::{
    Batch, BatchCommand, BatchId, BatchMeta, BatchStatus, Clock, ImpactedSet, Job, JobId,
    JobStatus, JobSummary, LockHolder, ProjectGraph, RepoRef, ResourceKey, VcsEvent, WorkItem,
};
use graft_storage::{StatusUpdate, Store, StoreError};
use std::collections::HashMap;

/// Scheduler behavior switches, usually taken from the repository config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Merge the PR when an apply batch covering every impacted project succeeds
    pub auto_merge: bool,
    /// Take resource locks for apply, lock and unlock commands
    pub pr_locks: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { auto_merge: false, pr_locks: true }
    }
}

impl SchedulerConfig {
    graft_core::setters! {
        set {
            auto_merge: bool,
            pr_locks: bool,
        }
    }
}

impl From<&RepoConfig> for SchedulerConfig {
    fn from(config: &RepoConfig) -> Self {
        Self { auto_merge: config.auto_merge, pr_locks: config.pr_locks }
    }
}

/// Collaborators the scheduler calls out to.
pub struct SchedulerDeps<S, D, N, M, I> {
    pub store: S,
    pub dispatcher: D,
    pub notifier: N,
    pub merger: M,
    pub detector: I,
}

/// Result of a job status report.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// The job as stored after the report
    pub job: Job,
    pub update: StatusUpdate,
    /// Children released by the completion cascade
    pub dispatched: Vec<JobId>,
    pub batch_status: BatchStatus,
}

pub struct Scheduler<S, D, N, M, I, C: Clock> {
    store: S,
    dispatcher: D,
    notifier: N,
    merger: M,
    detector: I,
    clock: C,
    config: SchedulerConfig,
}

impl<S, D, N, M, I, C> Scheduler<S, D, N, M, I, C>
where
    S: Store,
    D: Dispatcher,
    N: Notifier,
    M: AutoMerger,
    I: ImpactDetector,
    C: Clock,
{
    pub fn new(deps: SchedulerDeps<S, D, N, M, I>, clock: C, config: SchedulerConfig) -> Self {
        Self {
            store: deps.store,
            dispatcher: deps.dispatcher,
            notifier: deps.notifier,
            merger: deps.merger,
            detector: deps.detector,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Load and validate `repo`'s project configuration and store it as the
    /// repository's current projects. Nothing is stored if validation fails.
    pub fn load_projects(
        &self,
        repo: &RepoRef,
        provider: &impl ConfigProvider,
    ) -> Result<ProjectGraph, SchedulerError> {
        let graph = provider.load_projects()?;
        self.store.replace_projects(repo, graph.projects().cloned().collect())?;
        tracing::info!(
            %repo,
            projects = graph.len(),
            edges = graph.edge_count(),
            "projects loaded"
        );
        Ok(graph)
    }

    /// The stored project graph of `repo`.
    pub fn project_graph(&self, repo: &RepoRef) -> Result<ProjectGraph, SchedulerError> {
        Ok(ProjectGraph::from_projects(self.store.projects(repo)?)?)
    }

    /// Create a batch for `impacted` and release its root jobs.
    ///
    /// Apply batches take the resource lock of every impacted project first
    /// (when PR locks are enabled); a conflict aborts before anything is
    /// written. If the batch cannot be persisted, the locks taken for it are
    /// released again. A dispatch failure is returned after every other root
    /// was released, with the batch already persisted.
    pub async fn create_batch(
        &self,
        impacted: &ImpactedSet,
        work_items: &HashMap<String, WorkItem>,
        meta: BatchMeta,
    ) -> Result<BatchId, SchedulerError> {
        if impacted.is_empty() {
            return Err(SchedulerError::EmptyBatch);
        }
        let repo = meta.trigger.repo();
        let graph = self.project_graph(&repo)?;
        let reduced = reduce(&graph, impacted)?;
        check_work_items(&reduced, work_items)?;

        let holder = meta.trigger.lock_holder();
        let taken =
            if self.config.pr_locks && lock_action(meta.trigger.command) == LockAction::Acquire {
                let keys: Vec<ResourceKey> =
                    reduced.projects().map(|p| ResourceKey::for_project(&repo, p)).collect();
                self.acquire_all(&keys, &holder)?
            } else {
                Vec::new()
            };

        let materialized = match materialize(&self.store, &self.clock, &reduced, work_items, meta)
        {
            Ok(materialized) => materialized,
            Err(e) => {
                self.undo_locks(&taken, &holder);
                return Err(e);
            }
        };
        let batch_id = materialized.batch.id.clone();
        let jobs: Vec<Job> = materialized.jobs.into_values().collect();
        self.notify(&materialized.batch, &jobs).await;

        self.dispatch_pending_roots(&batch_id).await?;
        Ok(batch_id)
    }

    /// Release every job of the batch that is `Created` and has no parents.
    ///
    /// Also used to retry roots whose dispatch failed earlier.
    pub async fn dispatch_pending_roots(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<JobId>, SchedulerError> {
        let batch = self.batch(batch_id)?;
        let mut dispatched = Vec::new();
        let mut failed: Option<(JobId, DispatchError)> = None;
        for job in self.store.pending_root_jobs(batch_id)? {
            let outcome =
                release(&self.store, &self.dispatcher, &self.clock, &job, &batch.trigger).await?;
            match outcome {
                Release::Dispatched => dispatched.push(job.id),
                Release::AlreadyClaimed => {}
                Release::Failed(e) => {
                    if failed.is_none() {
                        failed = Some((job.id, e));
                    }
                }
            }
        }

        if !dispatched.is_empty() {
            let jobs = self.store.jobs_for_batch(batch_id)?;
            self.notify(&batch, &jobs).await;
        }
        match failed {
            Some((job_id, source)) => {
                Err(SchedulerError::Dispatch { batch_id: batch_id.clone(), job_id, source })
            }
            None => Ok(dispatched),
        }
    }

    /// Record a status change reported by the execution layer.
    ///
    /// A forward move is written, a repeated status is accepted as a
    /// redelivery, and anything else is [`SchedulerError::InvalidTransition`].
    /// On `Succeeded` the completion cascade runs, also for a redelivery, so a
    /// report retried after a crash still releases the children. The batch
    /// status is recomputed after every accepted report.
    pub async fn report_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        summary: Option<JobSummary>,
    ) -> Result<StatusReport, SchedulerError> {
        let job = self.job(job_id)?;
        let update = self.store.update_job_status(job_id, status, self.clock.epoch_ms())?;
        match update {
            StatusUpdate::Rejected { current } => {
                tracing::warn!(%job_id, from = %current, to = %status, "status report rejected");
                return Err(SchedulerError::InvalidTransition {
                    job_id: job_id.clone(),
                    from: current,
                    to: status,
                });
            }
            StatusUpdate::Applied { previous } => {
                tracing::info!(
                    batch_id = %job.batch_id,
                    %job_id,
                    project = %job.project,
                    from = %previous,
                    to = %status,
                    "job status changed"
                );
            }
            StatusUpdate::Unchanged => {
                tracing::debug!(%job_id, %status, "status already recorded");
            }
        }

        if status == JobStatus::Succeeded {
            if let Some(summary) = summary {
                self.store.set_job_summary(job_id, summary)?;
            }
        }

        let batch = self.batch(&job.batch_id)?;
        let mut dispatched = Vec::new();
        let mut failed = Vec::new();
        if status == JobStatus::Succeeded {
            let job = self.job(job_id)?;
            let outcome =
                on_job_succeeded(&self.store, &self.dispatcher, &self.clock, &job, &batch.trigger)
                    .await?;
            dispatched = outcome.dispatched;
            failed = outcome.failed;
        } else if status == JobStatus::Failed {
            tracing::info!(
                batch_id = %job.batch_id,
                %job_id,
                project = %job.project,
                "job failed, descendants will not run"
            );
        }

        let rollup = recompute(&self.store, &job.batch_id)?;
        let changed = matches!(update, StatusUpdate::Applied { .. });
        if changed || !dispatched.is_empty() || rollup.changed() {
            self.notify(&rollup.batch, &rollup.jobs).await;
        }
        if rollup.just_succeeded() {
            self.maybe_auto_merge(&rollup.batch).await?;
        }

        if let Some((child, source)) = failed.into_iter().next() {
            return Err(SchedulerError::Dispatch {
                batch_id: job.batch_id.clone(),
                job_id: child,
                source,
            });
        }
        Ok(StatusReport {
            job: self.job(job_id)?,
            update,
            dispatched,
            batch_status: rollup.batch.status,
        })
    }

    /// Attach the handle of the external run to a job.
    pub fn set_workflow_ref(
        &self,
        job_id: &JobId,
        workflow_ref: impl Into<String>,
    ) -> Result<(), SchedulerError> {
        self.store
            .set_workflow_ref(job_id, workflow_ref.into())
            .map_err(|e| unknown_job_or(e, job_id))
    }

    pub fn set_job_summary(
        &self,
        job_id: &JobId,
        summary: JobSummary,
    ) -> Result<(), SchedulerError> {
        self.store.set_job_summary(job_id, summary).map_err(|e| unknown_job_or(e, job_id))
    }

    pub fn lock(&self, key: &ResourceKey, holder: &LockHolder) -> Result<Acquired, SchedulerError> {
        self.locks().acquire(key, holder)
    }

    pub fn unlock(&self, key: &ResourceKey, holder: &LockHolder) -> Result<(), SchedulerError> {
        self.locks().release(key, holder)
    }

    /// Release all of `holder`'s locks in `scope` (PR closed or merged).
    pub fn unlock_all(
        &self,
        holder: &LockHolder,
        scope: &RepoRef,
    ) -> Result<Vec<ResourceKey>, SchedulerError> {
        self.locks().release_all_for_holder(holder, scope)
    }

    /// Schedule work for one VCS event.
    ///
    /// Detects impacted projects against the repository's stored graph,
    /// applies the command's lock handling, and creates a batch for `plan`
    /// and `apply`. Returns `None` when no batch was created: nothing was
    /// impacted, or the command only touches locks.
    pub async fn handle_event(&self, event: &VcsEvent) -> Result<Option<BatchId>, SchedulerError> {
        let trigger = &event.trigger;
        let repo = trigger.repo();
        let graph = self.project_graph(&repo)?;
        let mut impacted = self.detector.detect(event, &graph).await?;

        let mut covers_all_impacted = true;
        if let Some(filter) = &event.project_filter {
            let Some(project) = impacted.shift_remove(filter) else {
                return Err(SchedulerError::ProjectNotImpacted(filter.clone()));
            };
            impacted = ImpactedSet::from([(project.name.clone(), project)]);
            covers_all_impacted = false;
        }
        if impacted.is_empty() {
            tracing::info!(repo = %repo, command = %trigger.command, "no impacted projects");
            return Ok(None);
        }
        tracing::info!(
            repo = %repo,
            command = %trigger.command,
            holder = %trigger.lock_holder(),
            impacted = impacted.len(),
            "handling event"
        );

        let holder = trigger.lock_holder();
        let keys: Vec<ResourceKey> =
            impacted.values().map(|p| ResourceKey::for_project(&repo, p)).collect();
        if !trigger.command.runs_jobs() {
            if !self.config.pr_locks {
                tracing::debug!(command = %trigger.command, "PR locks disabled, nothing to do");
                return Ok(None);
            }
            match lock_action(trigger.command) {
                LockAction::Acquire => {
                    self.acquire_all(&keys, &holder)?;
                }
                LockAction::Release => {
                    self.release_keys(&keys, &holder)?;
                    if covers_all_impacted {
                        self.unlock_all(&holder, &repo)?;
                    }
                }
                LockAction::None => {}
            }
            return Ok(None);
        }

        let work_items = work_items_for(event, &impacted);
        let meta = BatchMeta::new(trigger.clone()).covers_all_impacted(covers_all_impacted);
        self.create_batch(&impacted, &work_items, meta).await.map(Some)
    }

    fn locks(&self) -> ResourceLocks<'_, S, C> {
        ResourceLocks::new(&self.store, &self.clock)
    }

    /// Acquire every key or none: on a conflict, locks newly taken by this
    /// call are released again. Returns the keys this call newly locked.
    fn acquire_all(
        &self,
        keys: &[ResourceKey],
        holder: &LockHolder,
    ) -> Result<Vec<ResourceKey>, SchedulerError> {
        let locks = self.locks();
        let mut taken = Vec::new();
        for key in keys {
            match locks.acquire(key, holder) {
                Ok(Acquired::Created) => taken.push(key.clone()),
                Ok(Acquired::AlreadyHeld) => {}
                Err(e) => {
                    self.undo_locks(&taken, holder);
                    return Err(e);
                }
            }
        }
        Ok(taken)
    }

    /// Release locks taken for an operation that did not go through.
    fn undo_locks(&self, taken: &[ResourceKey], holder: &LockHolder) {
        let locks = self.locks();
        for key in taken {
            match locks.release(key, holder) {
                Ok(()) => tracing::debug!(%key, %holder, "lock undone"),
                Err(e) => tracing::warn!(%key, %holder, error = %e, "failed to undo lock"),
            }
        }
    }

    /// Release each key; keys that are not locked are skipped.
    fn release_keys(
        &self,
        keys: &[ResourceKey],
        holder: &LockHolder,
    ) -> Result<(), SchedulerError> {
        let locks = self.locks();
        for key in keys {
            match locks.release(key, holder) {
                Ok(()) => {}
                Err(SchedulerError::LockConflict(LockConflict::NotLocked { .. })) => {
                    tracing::debug!(%key, "not locked, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Fire the one-shot merge for a batch that just succeeded.
    async fn maybe_auto_merge(&self, batch: &Batch) -> Result<(), SchedulerError> {
        if batch.command() != BatchCommand::Apply || !self.config.auto_merge {
            return Ok(());
        }
        if !batch.covers_all_impacted {
            tracing::info!(batch_id = %batch.id, "partial batch, not merging");
            return Ok(());
        }
        if !self.store.mark_merge_triggered(&batch.id)? {
            return Ok(());
        }

        match self.merger.merge(&batch.trigger).await {
            Ok(()) => {
                tracing::info!(batch_id = %batch.id, repo = %batch.trigger.repo(), "auto-merged")
            }
            Err(e) => {
                tracing::warn!(batch_id = %batch.id, error = %e, "auto-merge failed");
                let message = format!("auto-merge failed: {e}");
                if let Err(e) = self.notifier.comment(batch, &message).await {
                    tracing::warn!(batch_id = %batch.id, error = %e, "failed to post comment");
                }
            }
        }
        Ok(())
    }

    async fn notify(&self, batch: &Batch, jobs: &[Job]) {
        if let Err(e) = self.notifier.report(batch, jobs).await {
            tracing::warn!(batch_id = %batch.id, error = %e, "status report failed");
        }
    }

    fn job(&self, id: &JobId) -> Result<Job, SchedulerError> {
        self.store.job(id)?.ok_or_else(|| SchedulerError::UnknownJob(id.clone()))
    }

    fn batch(&self, id: &BatchId) -> Result<Batch, SchedulerError> {
        self.store.batch(id)?.ok_or_else(|| SchedulerError::UnknownBatch(id.clone()))
    }
}

fn unknown_job_or(e: StoreError, job_id: &JobId) -> SchedulerError {
    match e {
        StoreError::NotFound { .. } => SchedulerError::UnknownJob(job_id.clone()),
        e => e.into(),
    }
}

/// One work item per impacted project: the command plus the event's
/// variables and the project's location.
fn work_items_for(event: &VcsEvent, impacted: &ImpactedSet) -> HashMap<String, WorkItem> {
    impacted
        .values()
        .map(|project| {
            let mut item = WorkItem::new(event.trigger.command.to_string());
            item.vars.extend(event.vars.clone());
            let item = item
                .var("project", &project.name)
                .var("dir", &project.dir)
                .var("workspace", &project.workspace);
            (project.name.clone(), item)
        })
        .collect()
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
