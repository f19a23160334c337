// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records and the job status state machine.

use crate::id::{BatchId, JobId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle of a job.
///
/// Transitions only move forward:
/// `Created → Triggered → Started → {Succeeded | Failed}`. Only the
/// dispatcher's conditional claim moves a job out of `Created`; reports from
/// the execution layer start at `Triggered`. They may skip intermediate states
/// (a `Succeeded` report can arrive before `Started`), but nothing leaves a
/// terminal state.
///
/// The one backwards move is `Triggered → Created`, written by the release
/// path when the dispatcher rejects a job it just claimed, so the job can be
/// released again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Persisted, waiting for its parents (or for the initial release)
    Created,
    /// Handed to the dispatcher
    Triggered,
    /// The remote run reported that it started
    Started,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::Triggered => 1,
            JobStatus::Started => 2,
            JobStatus::Succeeded | JobStatus::Failed => 3,
        }
    }

    /// Whether an execution-layer report may move `self` to `next`.
    ///
    /// A `Created` job was never dispatched, so no report applies to it.
    /// Re-reporting the current status is not a transition; see
    /// [`JobStatus::check_transition`].
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self != JobStatus::Created && !self.is_terminal() && next.rank() > self.rank()
    }

    /// Classify a status report against the current status.
    pub fn check_transition(self, next: JobStatus) -> Transition {
        if self == next {
            Transition::Unchanged
        } else if self.can_transition_to(next) {
            Transition::Forward
        } else {
            Transition::Rejected
        }
    }

    /// Parse the wire names used by execution-layer callbacks.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(JobStatus::Created),
            "triggered" => Some(JobStatus::Triggered),
            "started" => Some(JobStatus::Started),
            "succeeded" => Some(JobStatus::Succeeded),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

crate::simple_display! {
    JobStatus {
        Created => "created",
        Triggered => "triggered",
        Started => "started",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

/// Result of comparing a reported status with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Forward,
    /// Same status reported again (at-least-once delivery)
    Unchanged,
    /// Backwards or out of a terminal state
    Rejected,
}

/// Opaque payload carried by a job to the executor (command + variables).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub command: String,
    #[serde(default)]
    pub vars: HashMap<String, String>,
}

impl WorkItem {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), vars: HashMap::new() }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

/// Resource counts reported by a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub resources_created: u32,
    pub resources_updated: u32,
    pub resources_deleted: u32,
}

/// One unit of work for one project within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub batch_id: BatchId,
    pub project: String,
    pub work_item: WorkItem,
    pub status: JobStatus,
    pub created_at_ms: u64,
    pub status_updated_at_ms: u64,
    /// CI workflow the dispatcher should start
    pub workflow_file: String,
    /// Handle of the external run (URL or run id), once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<JobSummary>,
}

impl Job {
    /// A freshly materialized job in `Created`.
    pub fn new(
        batch_id: BatchId,
        project: impl Into<String>,
        work_item: WorkItem,
        workflow_file: impl Into<String>,
        epoch_ms: u64,
    ) -> Self {
        Self {
            id: JobId::generate(),
            batch_id,
            project: project.into(),
            work_item,
            status: JobStatus::Created,
            created_at_ms: epoch_ms,
            status_updated_at_ms: epoch_ms,
            workflow_file: workflow_file.into(),
            workflow_ref: None,
            summary: None,
        }
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = "job-test",
            batch_id: BatchId = "bat-test",
            project: String = "dev",
            workflow_file: String = crate::project::DEFAULT_WORKFLOW_FILE,
        }
        set {
            work_item: WorkItem = WorkItem::new("plan"),
            status: JobStatus = JobStatus::Created,
            created_at_ms: u64 = 1_000_000,
            status_updated_at_ms: u64 = 1_000_000,
        }
        option {
            workflow_ref: String,
            summary: JobSummary,
        }
    }
}

/// Edge of the job DAG: `child` may only run after `parent` succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobParentLink {
    pub parent: JobId,
    pub child: JobId,
}

impl JobParentLink {
    pub fn new(parent: JobId, child: JobId) -> Self {
        Self { parent, child }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
