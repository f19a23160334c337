// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository configuration schema.

use crate::parser::ConfigError;
use graft_core::{Project, ProjectGraph, DEFAULT_WORKFLOW_FILE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Top-level repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Merge the PR once an apply batch covering every impacted project succeeds
    #[serde(default)]
    pub auto_merge: bool,
    /// Take resource locks for apply/lock/unlock commands
    #[serde(default = "default_true")]
    pub pr_locks: bool,
    #[serde(default, alias = "projects")]
    pub project: IndexMap<String, ProjectDef>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self { auto_merge: false, pr_locks: true, project: IndexMap::new() }
    }
}

impl RepoConfig {
    /// Declared projects in declaration order.
    pub fn projects(&self) -> Vec<Project> {
        self.project.values().map(ProjectDef::to_project).collect()
    }

    /// Build the validated dependency graph.
    pub fn graph(&self) -> Result<ProjectGraph, ConfigError> {
        Ok(ProjectGraph::from_projects(self.projects())?)
    }
}

/// One `project` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDef {
    /// Filled from the block label / table key
    #[serde(default, skip_serializing)]
    pub name: String,
    #[serde(default = "default_dir")]
    pub dir: String,
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_workflow_file")]
    pub workflow_file: String,
}

impl ProjectDef {
    pub fn to_project(&self) -> Project {
        Project::new(&self.name)
            .dir(&self.dir)
            .workspace(&self.workspace)
            .workflow_file(&self.workflow_file)
            .include_patterns(self.include_patterns.clone())
            .exclude_patterns(self.exclude_patterns.clone())
            .depends_on(self.depends_on.iter().cloned())
    }
}

fn default_true() -> bool {
    true
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_workspace() -> String {
    "default".to_string()
}

fn default_workflow_file() -> String {
    DEFAULT_WORKFLOW_FILE.to_string()
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
