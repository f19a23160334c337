// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler error types

use graft_adapters::{DispatchError, ImpactDetectionError};
use graft_config::ConfigError;
use graft_core::{BatchId, GraphError, JobId, JobStatus, LockHolder, ResourceKey};
use graft_storage::StoreError;
use thiserror::Error;

/// Rejected lock commands. An expected business outcome, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockConflict {
    #[error("{key} is already locked by {holder}")]
    AlreadyLocked { key: ResourceKey, holder: LockHolder },
    #[error("{key} is not locked")]
    NotLocked { key: ResourceKey },
    #[error("{key} is locked by {holder}, not {requester}")]
    NotHolder { key: ResourceKey, holder: LockHolder, requester: LockHolder },
}

/// Errors surfaced by the [`crate::Scheduler`]
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bad dependency graph or configuration; fatal for the batch
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Retriable by the caller
    #[error("impact detection failed: {0}")]
    ImpactDetection(#[from] ImpactDetectionError),
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error(transparent)]
    LockConflict(#[from] LockConflict),
    /// The job stays `Created`; re-submit to retry
    #[error("failed to dispatch job {job_id} of batch {batch_id}: {source}")]
    Dispatch {
        batch_id: BatchId,
        job_id: JobId,
        #[source]
        source: DispatchError,
    },
    #[error("unknown job {0}")]
    UnknownJob(JobId),
    #[error("unknown batch {0}")]
    UnknownBatch(BatchId),
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition { job_id: JobId, from: JobStatus, to: JobStatus },
    #[error("no work item for project '{0}'")]
    MissingWorkItem(String),
    #[error("project '{0}' is not impacted by this change")]
    ProjectNotImpacted(String),
    #[error("nothing to schedule: no impacted projects")]
    EmptyBatch,
}

impl From<GraphError> for SchedulerError {
    fn from(e: GraphError) -> Self {
        SchedulerError::Config(ConfigError::Graph(e))
    }
}
