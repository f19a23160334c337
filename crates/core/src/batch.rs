// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batches: every job created for one triggering VCS event.

use crate::id::BatchId;
use crate::job::{Job, JobStatus};
use crate::lock::LockHolder;
use crate::project::RepoRef;
use serde::{Deserialize, Serialize};

/// Overall status of a batch, derived from its jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Succeeded,
    Failed,
    /// Display-only; never produced by status derivation
    PartialFailure,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BatchStatus::Running)
    }

    /// Roll up job statuses: any failure fails the batch, all succeeded
    /// succeeds it, anything else is still running.
    ///
    /// An empty batch is `Succeeded` (vacuously), although batches are only
    /// created with at least one job.
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        let mut all_succeeded = true;
        for status in statuses {
            match status {
                JobStatus::Failed => return BatchStatus::Failed,
                JobStatus::Succeeded => {}
                _ => all_succeeded = false,
            }
        }
        if all_succeeded {
            BatchStatus::Succeeded
        } else {
            BatchStatus::Running
        }
    }

    pub fn derive_from_jobs(jobs: &[Job]) -> Self {
        Self::derive(jobs.iter().map(|j| j.status))
    }
}

crate::simple_display! {
    BatchStatus {
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        PartialFailure => "partial_failure",
    }
}

/// Command type carried by the triggering event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchCommand {
    Plan,
    Apply,
    Lock,
    Unlock,
}

impl BatchCommand {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "plan" => Some(BatchCommand::Plan),
            "apply" => Some(BatchCommand::Apply),
            "lock" => Some(BatchCommand::Lock),
            "unlock" => Some(BatchCommand::Unlock),
            _ => None,
        }
    }

    /// Whether this command produces jobs (as opposed to only touching locks).
    pub fn runs_jobs(self) -> bool {
        matches!(self, BatchCommand::Plan | BatchCommand::Apply)
    }
}

crate::simple_display! {
    BatchCommand {
        Plan => "plan",
        Apply => "apply",
        Lock => "lock",
        Unlock => "unlock",
    }
}

/// Where a batch came from: repository, PR or commit, and the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub organization: String,
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    pub commit_sha: String,
    pub branch: String,
    pub command: BatchCommand,
}

impl TriggerContext {
    pub fn new(
        organization: impl Into<String>,
        repository: impl Into<String>,
        command: BatchCommand,
    ) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            pr_number: None,
            commit_sha: String::new(),
            branch: String::new(),
            command,
        }
    }

    crate::setters! {
        into {
            commit_sha: String,
            branch: String,
        }
        option {
            pr_number: u64,
        }
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(&self.organization, &self.repository)
    }

    /// The identity that owns locks taken on behalf of this trigger: the PR
    /// when there is one, otherwise the commit being built.
    pub fn lock_holder(&self) -> LockHolder {
        match self.pr_number {
            Some(pr) => LockHolder::PullRequest(pr),
            None => LockHolder::Run(self.commit_sha.clone()),
        }
    }
}

/// Caller-supplied batch metadata for materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMeta {
    pub trigger: TriggerContext,
    /// The batch runs every impacted project (not a single-project command)
    pub covers_all_impacted: bool,
}

impl BatchMeta {
    pub fn new(trigger: TriggerContext) -> Self {
        Self { trigger, covers_all_impacted: true }
    }

    crate::setters! {
        set {
            covers_all_impacted: bool,
        }
    }
}

/// Persisted batch row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub trigger: TriggerContext,
    pub status: BatchStatus,
    pub created_at_ms: u64,
    pub covers_all_impacted: bool,
    /// Set once when the auto-merge side effect has fired
    #[serde(default)]
    pub merge_triggered: bool,
}

impl Batch {
    pub fn new(meta: BatchMeta, epoch_ms: u64) -> Self {
        Self {
            id: BatchId::generate(),
            trigger: meta.trigger,
            status: BatchStatus::Running,
            created_at_ms: epoch_ms,
            covers_all_impacted: meta.covers_all_impacted,
            merge_triggered: false,
        }
    }

    pub fn command(&self) -> BatchCommand {
        self.trigger.command
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
