// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store contract the scheduler relies on.

use graft_core::{
    Batch, BatchId, BatchStatus, Job, JobId, JobParentLink, JobStatus, JobSummary, LockHolder,
    Project, RepoRef, ResourceKey, ResourceLock,
};
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn job_not_found(id: &JobId) -> Self {
        StoreError::NotFound { kind: "job", id: id.to_string() }
    }

    pub fn batch_not_found(id: &BatchId) -> Self {
        StoreError::NotFound { kind: "batch", id: id.to_string() }
    }
}

/// Outcome of an unconditional status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The status moved forward
    Applied { previous: JobStatus },
    /// The job already had this status
    Unchanged,
    /// Not a forward transition; nothing was written
    Rejected { current: JobStatus },
}

/// Outcome of a holder-scoped lock delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockRemoval {
    Removed,
    Absent,
    HeldBy(LockHolder),
}

/// Transactional store.
///
/// Each method is atomic on its own. No method spans more than one logical
/// step, except [`Store::insert_job`] which writes a job together with its
/// parent links so a crash never leaves a half-linked node.
pub trait Store: Send + Sync {
    /// Replace the configured projects of a repository.
    fn replace_projects(&self, repo: &RepoRef, projects: Vec<Project>) -> Result<(), StoreError>;
    fn projects(&self, repo: &RepoRef) -> Result<Vec<Project>, StoreError>;

    fn insert_batch(&self, batch: Batch) -> Result<(), StoreError>;
    fn batch(&self, id: &BatchId) -> Result<Option<Batch>, StoreError>;
    fn set_batch_status(&self, id: &BatchId, status: BatchStatus) -> Result<(), StoreError>;
    /// Check-and-set the one-shot merge flag. Returns `true` for the single
    /// caller that flipped it.
    fn mark_merge_triggered(&self, id: &BatchId) -> Result<bool, StoreError>;

    /// Insert a job and the links to its parents in one transaction.
    ///
    /// Every link must name `job` as the child and an existing job as the
    /// parent; the batch must exist.
    fn insert_job(&self, job: Job, parents: Vec<JobParentLink>) -> Result<(), StoreError>;
    fn job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;
    /// Jobs of a batch in insertion order.
    fn jobs_for_batch(&self, id: &BatchId) -> Result<Vec<Job>, StoreError>;
    /// Write `status` if it moves the job forward.
    fn update_job_status(
        &self,
        id: &JobId,
        status: JobStatus,
        epoch_ms: u64,
    ) -> Result<StatusUpdate, StoreError>;
    /// Conditional write: set `next` only if the current status is exactly
    /// `expected`. Returns whether the write happened.
    fn transition_job_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        next: JobStatus,
        epoch_ms: u64,
    ) -> Result<bool, StoreError>;
    fn set_workflow_ref(&self, id: &JobId, workflow_ref: String) -> Result<(), StoreError>;
    fn set_job_summary(&self, id: &JobId, summary: JobSummary) -> Result<(), StoreError>;
    fn links_by_parent(&self, parent: &JobId) -> Result<Vec<JobParentLink>, StoreError>;
    fn links_by_child(&self, child: &JobId) -> Result<Vec<JobParentLink>, StoreError>;
    /// Jobs of a batch still `Created` that have no parent links.
    fn pending_root_jobs(&self, batch: &BatchId) -> Result<Vec<Job>, StoreError>;

    /// Insert the lock if no lock exists for its key; otherwise return the
    /// existing lock untouched.
    fn try_insert_lock(&self, lock: ResourceLock) -> Result<Option<ResourceLock>, StoreError>;
    fn lock(&self, key: &ResourceKey) -> Result<Option<ResourceLock>, StoreError>;
    /// Delete the lock only if `holder` holds it.
    fn delete_lock_if_held(
        &self,
        key: &ResourceKey,
        holder: &LockHolder,
    ) -> Result<LockRemoval, StoreError>;
    /// Delete every lock in `scope` held by `holder`, returning the released keys.
    fn delete_locks_for_holder(
        &self,
        holder: &LockHolder,
        scope: &RepoRef,
    ) -> Result<Vec<ResourceKey>, StoreError>;
}
