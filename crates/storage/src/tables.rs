// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five logical tables and their secondary indexes.

use crate::store::{LockRemoval, StatusUpdate, StoreError};
use graft_core::{
    Batch, BatchId, Job, JobId, JobParentLink, JobStatus, LockHolder, Project, RepoRef,
    ResourceKey, ResourceLock, Transition,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Row storage. Secondary indexes are rebuilt after deserialization.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tables {
    /// Repository (`org#repo`) → configured projects
    #[serde(default)]
    pub projects: IndexMap<String, Vec<Project>>,
    #[serde(default)]
    pub jobs: IndexMap<JobId, Job>,
    #[serde(default)]
    pub job_parent_links: Vec<JobParentLink>,
    #[serde(default)]
    pub batches: IndexMap<BatchId, Batch>,
    /// Resource key (`org#repo#project#workspace`) → lock
    #[serde(default)]
    pub resource_locks: IndexMap<String, ResourceLock>,

    #[serde(skip)]
    links_by_parent: HashMap<JobId, Vec<usize>>,
    #[serde(skip)]
    links_by_child: HashMap<JobId, Vec<usize>>,
    #[serde(skip)]
    jobs_by_batch: HashMap<BatchId, Vec<JobId>>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the parent/child link indexes and the batch → jobs index.
    pub fn rebuild_indexes(&mut self) {
        self.links_by_parent.clear();
        self.links_by_child.clear();
        self.jobs_by_batch.clear();
        for (i, link) in self.job_parent_links.iter().enumerate() {
            self.links_by_parent.entry(link.parent.clone()).or_default().push(i);
            self.links_by_child.entry(link.child.clone()).or_default().push(i);
        }
        for job in self.jobs.values() {
            self.jobs_by_batch.entry(job.batch_id.clone()).or_default().push(job.id.clone());
        }
    }

    pub(crate) fn insert_batch(&mut self, batch: Batch) -> Result<(), StoreError> {
        if self.batches.contains_key(&batch.id) {
            return Err(StoreError::Constraint(format!("duplicate batch id {}", batch.id)));
        }
        self.batches.insert(batch.id.clone(), batch);
        Ok(())
    }

    pub(crate) fn batch_mut(&mut self, id: &BatchId) -> Result<&mut Batch, StoreError> {
        self.batches.get_mut(id).ok_or_else(|| StoreError::batch_not_found(id))
    }

    /// Validate and insert a job with its parent links. Nothing is written
    /// unless every check passes.
    pub(crate) fn insert_job(
        &mut self,
        job: Job,
        parents: Vec<JobParentLink>,
    ) -> Result<(), StoreError> {
        if self.jobs.contains_key(&job.id) {
            return Err(StoreError::Constraint(format!("duplicate job id {}", job.id)));
        }
        if !self.batches.contains_key(&job.batch_id) {
            return Err(StoreError::batch_not_found(&job.batch_id));
        }
        for link in &parents {
            if link.child != job.id {
                return Err(StoreError::Constraint(format!(
                    "link child {} does not match job {}",
                    link.child, job.id
                )));
            }
            if !self.jobs.contains_key(&link.parent) {
                return Err(StoreError::job_not_found(&link.parent));
            }
        }

        self.jobs_by_batch.entry(job.batch_id.clone()).or_default().push(job.id.clone());
        self.jobs.insert(job.id.clone(), job);
        let mut seen = HashSet::new();
        for link in parents {
            if !seen.insert(link.parent.clone()) {
                continue;
            }
            let i = self.job_parent_links.len();
            self.links_by_parent.entry(link.parent.clone()).or_default().push(i);
            self.links_by_child.entry(link.child.clone()).or_default().push(i);
            self.job_parent_links.push(link);
        }
        Ok(())
    }

    pub(crate) fn job_mut(&mut self, id: &JobId) -> Result<&mut Job, StoreError> {
        self.jobs.get_mut(id).ok_or_else(|| StoreError::job_not_found(id))
    }

    pub fn jobs_for_batch(&self, id: &BatchId) -> Vec<Job> {
        self.jobs_by_batch
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|job_id| self.jobs.get(job_id))
            .cloned()
            .collect()
    }

    pub(crate) fn update_job_status(
        &mut self,
        id: &JobId,
        status: JobStatus,
        epoch_ms: u64,
    ) -> Result<StatusUpdate, StoreError> {
        let job = self.job_mut(id)?;
        let previous = job.status;
        Ok(match previous.check_transition(status) {
            Transition::Forward => {
                job.status = status;
                job.status_updated_at_ms = epoch_ms;
                StatusUpdate::Applied { previous }
            }
            Transition::Unchanged => StatusUpdate::Unchanged,
            Transition::Rejected => StatusUpdate::Rejected { current: previous },
        })
    }

    pub(crate) fn transition_job_status(
        &mut self,
        id: &JobId,
        expected: JobStatus,
        next: JobStatus,
        epoch_ms: u64,
    ) -> Result<bool, StoreError> {
        let job = self.job_mut(id)?;
        if job.status != expected {
            return Ok(false);
        }
        job.status = next;
        job.status_updated_at_ms = epoch_ms;
        Ok(true)
    }

    pub fn links_by_parent(&self, parent: &JobId) -> Vec<JobParentLink> {
        self.links_at(self.links_by_parent.get(parent))
    }

    pub fn links_by_child(&self, child: &JobId) -> Vec<JobParentLink> {
        self.links_at(self.links_by_child.get(child))
    }

    fn links_at(&self, positions: Option<&Vec<usize>>) -> Vec<JobParentLink> {
        positions
            .into_iter()
            .flatten()
            .filter_map(|i| self.job_parent_links.get(*i))
            .cloned()
            .collect()
    }

    pub fn pending_root_jobs(&self, batch: &BatchId) -> Vec<Job> {
        self.jobs_for_batch(batch)
            .into_iter()
            .filter(|job| job.status == JobStatus::Created)
            .filter(|job| !self.links_by_child.contains_key(&job.id))
            .collect()
    }

    pub(crate) fn try_insert_lock(&mut self, lock: ResourceLock) -> Option<ResourceLock> {
        let key = lock.key.to_string();
        if let Some(existing) = self.resource_locks.get(&key) {
            return Some(existing.clone());
        }
        self.resource_locks.insert(key, lock);
        None
    }

    pub fn lock(&self, key: &ResourceKey) -> Option<&ResourceLock> {
        self.resource_locks.get(&key.to_string())
    }

    pub(crate) fn delete_lock_if_held(
        &mut self,
        key: &ResourceKey,
        holder: &LockHolder,
    ) -> LockRemoval {
        let row = key.to_string();
        match self.resource_locks.get(&row) {
            None => LockRemoval::Absent,
            Some(lock) if &lock.holder != holder => LockRemoval::HeldBy(lock.holder.clone()),
            Some(_) => {
                self.resource_locks.shift_remove(&row);
                LockRemoval::Removed
            }
        }
    }

    pub(crate) fn delete_locks_for_holder(
        &mut self,
        holder: &LockHolder,
        scope: &RepoRef,
    ) -> Vec<ResourceKey> {
        let mut released = Vec::new();
        self.resource_locks.retain(|_, lock| {
            if &lock.holder == holder && lock.key.in_scope(scope) {
                released.push(lock.key.clone());
                false
            } else {
                true
            }
        });
        released
    }
}

#[cfg(test)]
#[path = "tables_tests.rs"]
mod tests;
