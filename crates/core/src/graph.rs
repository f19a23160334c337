// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project dependency graph.
//!
//! Edges point from a dependency to its dependent (`dev → prod` when `prod`
//! depends on `dev`). The graph keeps both a successor and a predecessor map so
//! that roots, parents and children are all O(1) lookups. Iteration order is
//! insertion order, which keeps traversals and tests deterministic.

use crate::project::Project;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use thiserror::Error;

/// Errors from building or extending a [`ProjectGraph`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("project '{0}' is declared more than once")]
    DuplicateProject(String),
    #[error("project '{project}' depends on unknown project '{dependency}'")]
    UnknownDependency { project: String, dependency: String },
    #[error("project '{0}' does not exist in the dependency graph")]
    UnknownProject(String),
    #[error("dependency cycle between projects: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Directed acyclic graph over project names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectGraph {
    projects: IndexMap<String, Project>,
    successors: IndexMap<String, IndexSet<String>>,
    predecessors: IndexMap<String, IndexSet<String>>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from declared projects and their `depends_on` lists.
    ///
    /// Fails on duplicate names, references to undeclared projects, and cycles.
    pub fn from_projects<I>(projects: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = Project>,
    {
        let mut graph = Self::new();
        let projects: Vec<Project> = projects.into_iter().collect();
        for project in &projects {
            if !graph.add_project(project.clone()) {
                return Err(GraphError::DuplicateProject(project.name.clone()));
            }
        }
        for project in &projects {
            for dependency in &project.depends_on {
                if !graph.contains(dependency) {
                    return Err(GraphError::UnknownDependency {
                        project: project.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                graph.add_edge(dependency, &project.name)?;
            }
        }
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Add a vertex. Returns `false` (and changes nothing) if the name exists.
    pub fn add_project(&mut self, project: Project) -> bool {
        if self.projects.contains_key(&project.name) {
            return false;
        }
        let name = project.name.clone();
        self.successors.insert(name.clone(), IndexSet::new());
        self.predecessors.insert(name.clone(), IndexSet::new());
        self.projects.insert(name, project);
        true
    }

    /// Add the edge `from → to`. Re-adding an existing edge is a no-op.
    ///
    /// Does not check for cycles; callers that add arbitrary edges must call
    /// [`ProjectGraph::check_acyclic`] afterwards.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if !self.contains(to) {
            return Err(GraphError::UnknownProject(to.to_string()));
        }
        let Some(children) = self.successors.get_mut(from) else {
            return Err(GraphError::UnknownProject(from.to_string()));
        };
        children.insert(to.to_string());
        if let Some(parents) = self.predecessors.get_mut(to) {
            parents.insert(from.to_string());
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Direct dependents of `name` (empty for unknown names).
    pub fn successors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.successors.get(name).into_iter().flatten().map(String::as_str)
    }

    /// Direct dependencies of `name` (empty for unknown names).
    pub fn predecessors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.predecessors.get(name).into_iter().flatten().map(String::as_str)
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.predecessors.get(name).map_or(0, IndexSet::len)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.successors.get(from).is_some_and(|c| c.contains(to))
    }

    /// Nodes with no predecessors, in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.predecessors.iter().filter(|(_, p)| p.is_empty()).map(|(n, _)| n.as_str())
    }

    /// All edges as `(from, to)` pairs.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.successors
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.clone(), to.clone())))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.values().map(IndexSet::len).sum()
    }

    /// Whether `to` can be reached from `from` by following one or more edges.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<&str> = self.successors(from).collect();
        while let Some(node) = queue.pop_front() {
            if node == to {
                return true;
            }
            if seen.insert(node) {
                queue.extend(self.successors(node));
            }
        }
        false
    }

    /// Kahn's algorithm; reports the nodes left over when a cycle blocks progress.
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut remaining: IndexMap<&str, usize> =
            self.names().map(|n| (n, self.in_degree(n))).collect();
        let mut ready: VecDeque<&str> =
            remaining.iter().filter(|(_, d)| **d == 0).map(|(n, _)| *n).collect();
        while let Some(node) = ready.pop_front() {
            remaining.shift_remove(node);
            for child in self.successors(node) {
                if let Some(degree) = remaining.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(child);
                    }
                }
            }
        }
        if remaining.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Cycle(remaining.keys().map(|n| n.to_string()).collect()))
        }
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
