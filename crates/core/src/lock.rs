// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource locks serializing commands against one project workspace.

use crate::project::RepoRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical resource guarded by a lock: one project workspace in one repo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub organization: String,
    pub repository: String,
    pub project: String,
    pub workspace: String,
}

impl ResourceKey {
    pub fn new(
        organization: impl Into<String>,
        repository: impl Into<String>,
        project: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            project: project.into(),
            workspace: workspace.into(),
        }
    }

    /// Key for `project`'s workspace within `repo`.
    pub fn for_project(repo: &RepoRef, project: &crate::Project) -> Self {
        Self::new(&repo.organization, &repo.repository, &project.name, &project.workspace)
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(&self.organization, &self.repository)
    }

    pub fn in_scope(&self, scope: &RepoRef) -> bool {
        self.organization == scope.organization && self.repository == scope.repository
    }
}

/// Renders as `org#repo#project#workspace`, the persisted row key.
impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}#{}#{}", self.organization, self.repository, self.project, self.workspace)
    }
}

/// Who owns a lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LockHolder {
    PullRequest(u64),
    /// A non-PR run, identified by commit or run id
    Run(String),
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockHolder::PullRequest(n) => write!(f, "pr#{n}"),
            LockHolder::Run(id) => write!(f, "run:{id}"),
        }
    }
}

/// Persisted lock row. At most one per [`ResourceKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    pub key: ResourceKey,
    pub holder: LockHolder,
    pub acquired_at_ms: u64,
}

impl ResourceLock {
    pub fn new(key: ResourceKey, holder: LockHolder, epoch_ms: u64) -> Self {
        Self { key, holder, acquired_at_ms: epoch_ms }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
