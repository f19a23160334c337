// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Projects declared by repository configuration.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Default CI workflow used to run a project's jobs.
pub const DEFAULT_WORKFLOW_FILE: &str = "graft_workflow.yml";

/// One deployable unit of infrastructure code.
///
/// Immutable for the lifetime of a scheduling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique within a [`crate::ProjectGraph`]
    pub name: String,
    pub dir: String,
    pub workspace: String,
    /// Names of projects that must run before this one
    #[serde(default)]
    pub depends_on: IndexSet<String>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    pub workflow_file: String,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: ".".to_string(),
            workspace: "default".to_string(),
            depends_on: IndexSet::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            workflow_file: DEFAULT_WORKFLOW_FILE.to_string(),
        }
    }

    crate::setters! {
        into {
            dir: String,
            workspace: String,
            workflow_file: String,
        }
        set {
            include_patterns: Vec<String>,
            exclude_patterns: Vec<String>,
        }
    }

    /// Add dependencies by name.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }
}

/// Projects affected by a change, keyed by name.
///
/// Produced by impact detection; not necessarily graph-connected.
pub type ImpactedSet = IndexMap<String, Project>;

/// Collect projects into an [`ImpactedSet`].
pub fn impacted_set<I: IntoIterator<Item = Project>>(projects: I) -> ImpactedSet {
    projects.into_iter().map(|p| (p.name.clone(), p)).collect()
}

/// An organization's repository: the scope of project configs and PR locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub organization: String,
    pub repository: String,
}

impl RepoRef {
    pub fn new(organization: impl Into<String>, repository: impl Into<String>) -> Self {
        Self { organization: organization.into(), repository: repository.into() }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.organization, self.repository)
    }
}
