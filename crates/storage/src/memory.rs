// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`Store`] with row-level atomicity.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::store::{LockRemoval, StatusUpdate, Store, StoreError};
use crate::tables::Tables;
use graft_core::{
    Batch, BatchId, BatchStatus, Job, JobId, JobParentLink, JobStatus, JobSummary, LockHolder,
    Project, RepoRef, ResourceKey, ResourceLock,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    /// Writes allowed before every further write fails (fault injection)
    write_budget: Option<usize>,
    /// Writes allowed before a single write fails (fault injection)
    failing_write: Option<usize>,
}

impl Inner {
    fn charge_write(&mut self) -> Result<(), StoreError> {
        match self.failing_write {
            Some(0) => {
                self.failing_write = None;
                return Err(StoreError::Unavailable("injected write failure".to_string()));
            }
            Some(n) => self.failing_write = Some(n - 1),
            None => {}
        }
        match self.write_budget.as_mut() {
            Some(0) => Err(StoreError::Unavailable("injected write failure".to_string())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Shared-state store. Clones share the same tables.
///
/// Every operation runs under one mutex acquisition, which gives each call
/// the atomicity a relational store gives a single-row transaction.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(mut tables: Tables) -> Self {
        tables.rebuild_indexes();
        Self { inner: Arc::new(Mutex::new(Inner { tables, ..Inner::default() })) }
    }

    /// Copy of the current tables.
    pub fn tables(&self) -> Tables {
        self.inner.lock().tables.clone()
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::new(self.tables());
        snapshot.save(path)
    }

    /// Restore from a snapshot file; a missing file yields an empty store.
    pub fn load_snapshot(path: &Path) -> Result<Self, SnapshotError> {
        match Snapshot::load(path)? {
            Some(snapshot) => {
                tracing::info!(
                    path = %path.display(),
                    created_at = %snapshot.created_at,
                    jobs = snapshot.tables.jobs.len(),
                    "restored store from snapshot"
                );
                Ok(Self::from_tables(snapshot.tables))
            }
            None => {
                tracing::info!(path = %path.display(), "no snapshot found, starting empty");
                Ok(Self::new())
            }
        }
    }

    /// Let `n` more writes succeed, then fail every write with
    /// [`StoreError::Unavailable`].
    #[cfg(any(test, feature = "test-support"))]
    pub fn fail_writes_after(&self, n: usize) {
        self.inner.lock().write_budget = Some(n);
    }

    /// Let `n` more writes succeed, fail the next one, and succeed again after.
    #[cfg(any(test, feature = "test-support"))]
    pub fn fail_one_write_after(&self, n: usize) {
        self.inner.lock().failing_write = Some(n);
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn clear_write_faults(&self) {
        let mut inner = self.inner.lock();
        inner.write_budget = None;
        inner.failing_write = None;
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut inner = self.inner.lock();
        inner.charge_write()?;
        f(&mut inner.tables)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        Ok(f(&self.inner.lock().tables))
    }
}

impl Store for MemoryStore {
    fn replace_projects(&self, repo: &RepoRef, projects: Vec<Project>) -> Result<(), StoreError> {
        self.write(|t| {
            t.projects.insert(repo.to_string(), projects);
            Ok(())
        })
    }

    fn projects(&self, repo: &RepoRef) -> Result<Vec<Project>, StoreError> {
        self.read(|t| t.projects.get(&repo.to_string()).cloned().unwrap_or_default())
    }

    fn insert_batch(&self, batch: Batch) -> Result<(), StoreError> {
        self.write(|t| t.insert_batch(batch))
    }

    fn batch(&self, id: &BatchId) -> Result<Option<Batch>, StoreError> {
        self.read(|t| t.batches.get(id).cloned())
    }

    fn set_batch_status(&self, id: &BatchId, status: BatchStatus) -> Result<(), StoreError> {
        self.write(|t| {
            t.batch_mut(id)?.status = status;
            Ok(())
        })
    }

    fn mark_merge_triggered(&self, id: &BatchId) -> Result<bool, StoreError> {
        self.write(|t| {
            let batch = t.batch_mut(id)?;
            if batch.merge_triggered {
                return Ok(false);
            }
            batch.merge_triggered = true;
            Ok(true)
        })
    }

    fn insert_job(&self, job: Job, parents: Vec<JobParentLink>) -> Result<(), StoreError> {
        self.write(|t| t.insert_job(job, parents))
    }

    fn job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        self.read(|t| t.jobs.get(id).cloned())
    }

    fn jobs_for_batch(&self, id: &BatchId) -> Result<Vec<Job>, StoreError> {
        self.read(|t| t.jobs_for_batch(id))
    }

    fn update_job_status(
        &self,
        id: &JobId,
        status: JobStatus,
        epoch_ms: u64,
    ) -> Result<StatusUpdate, StoreError> {
        self.write(|t| t.update_job_status(id, status, epoch_ms))
    }

    fn transition_job_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        next: JobStatus,
        epoch_ms: u64,
    ) -> Result<bool, StoreError> {
        self.write(|t| t.transition_job_status(id, expected, next, epoch_ms))
    }

    fn set_workflow_ref(&self, id: &JobId, workflow_ref: String) -> Result<(), StoreError> {
        self.write(|t| {
            t.job_mut(id)?.workflow_ref = Some(workflow_ref);
            Ok(())
        })
    }

    fn set_job_summary(&self, id: &JobId, summary: JobSummary) -> Result<(), StoreError> {
        self.write(|t| {
            t.job_mut(id)?.summary = Some(summary);
            Ok(())
        })
    }

    fn links_by_parent(&self, parent: &JobId) -> Result<Vec<JobParentLink>, StoreError> {
        self.read(|t| t.links_by_parent(parent))
    }

    fn links_by_child(&self, child: &JobId) -> Result<Vec<JobParentLink>, StoreError> {
        self.read(|t| t.links_by_child(child))
    }

    fn pending_root_jobs(&self, batch: &BatchId) -> Result<Vec<Job>, StoreError> {
        self.read(|t| t.pending_root_jobs(batch))
    }

    fn try_insert_lock(&self, lock: ResourceLock) -> Result<Option<ResourceLock>, StoreError> {
        self.write(|t| Ok(t.try_insert_lock(lock)))
    }

    fn lock(&self, key: &ResourceKey) -> Result<Option<ResourceLock>, StoreError> {
        self.read(|t| t.lock(key).cloned())
    }

    fn delete_lock_if_held(
        &self,
        key: &ResourceKey,
        holder: &LockHolder,
    ) -> Result<LockRemoval, StoreError> {
        self.write(|t| Ok(t.delete_lock_if_held(key, holder)))
    }

    fn delete_locks_for_holder(
        &self,
        holder: &LockHolder,
        scope: &RepoRef,
    ) -> Result<Vec<ResourceKey>, StoreError> {
        self.write(|t| Ok(t.delete_locks_for_holder(holder, scope)))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
