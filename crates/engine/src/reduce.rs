// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Impact reduction: project the dependency graph onto impacted projects.
//!
//! Skipped projects are compressed through rather than dropped: with
//! `net → app → web` and only `net` and `web` impacted, the reduced graph has
//! the edge `net → web`.

use graft_core::{GraphError, ImpactedSet, ProjectGraph};
use std::collections::HashSet;

/// Reduce `graph` to the projects in `impacted`.
///
/// The result has an edge `a → b` iff `b` is reachable from `a` in `graph`
/// through projects that are all outside `impacted`. An impacted name that is
/// not in `graph` is a configuration error.
pub fn reduce(graph: &ProjectGraph, impacted: &ImpactedSet) -> Result<ProjectGraph, GraphError> {
    if let Some(missing) = impacted.keys().find(|name| !graph.contains(name)) {
        return Err(GraphError::UnknownProject(missing.clone()));
    }

    let mut reduced = ProjectGraph::new();
    for name in graph.names() {
        if let Some(project) = impacted.get(name) {
            reduced.add_project(project.clone());
        }
    }

    // Depth-first from every root, carrying the nearest impacted ancestor.
    // A node reached again with the same ancestor adds nothing new, so each
    // (node, ancestor) pair is expanded once.
    let mut expanded: HashSet<(&str, Option<&str>)> = HashSet::new();
    let mut stack: Vec<(&str, Option<&str>)> = graph.roots().map(|r| (r, None)).collect();
    stack.reverse();
    while let Some((node, ancestor)) = stack.pop() {
        if !expanded.insert((node, ancestor)) {
            continue;
        }
        let nearest = if impacted.contains_key(node) {
            if let Some(parent) = ancestor {
                reduced.add_edge(parent, node)?;
            }
            Some(node)
        } else {
            ancestor
        };
        let children: Vec<&str> = graph.successors(node).collect();
        stack.extend(children.into_iter().rev().map(|child| (child, nearest)));
    }

    tracing::debug!(
        projects = graph.len(),
        impacted = reduced.len(),
        edges = reduced.edge_count(),
        "reduced project graph"
    );
    Ok(reduced)
}

#[cfg(test)]
#[path = "reduce_tests.rs"]
mod tests;
