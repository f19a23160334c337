// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parent-first traversal.
//!
//! A synthetic root is connected to every true root so the walk has a single
//! origin, and the walk is breadth-first from there. A node is enqueued only
//! once all of its predecessors have been visited; plain BFS levels are not
//! enough when a node is reachable by paths of different lengths
//! (`a → b → c` and `a → c`).

use graft_core::ProjectGraph;
use std::collections::{HashMap, VecDeque};

enum Vertex<'a> {
    SyntheticRoot,
    Project(&'a str),
}

/// Visit every project of `graph` after all of its predecessors.
///
/// `visit` returning `false` does not stop the traversal; callers use it to
/// mark nodes they skipped. Returns how many visits returned `true`.
pub fn traverse_parents_first<F>(graph: &ProjectGraph, mut visit: F) -> usize
where
    F: FnMut(&str) -> bool,
{
    let mut waiting_on: HashMap<&str, usize> =
        graph.names().map(|name| (name, graph.in_degree(name))).collect();
    let mut queue = VecDeque::from([Vertex::SyntheticRoot]);
    let mut accepted = 0;

    while let Some(vertex) = queue.pop_front() {
        match vertex {
            Vertex::SyntheticRoot => {
                queue.extend(graph.roots().map(Vertex::Project));
            }
            Vertex::Project(name) => {
                if visit(name) {
                    accepted += 1;
                }
                for child in graph.successors(name) {
                    if let Some(remaining) = waiting_on.get_mut(child) {
                        *remaining = remaining.saturating_sub(1);
                        if *remaining == 0 {
                            queue.push_back(Vertex::Project(child));
                        }
                    }
                }
            }
        }
    }
    accepted
}

/// Parent-first visit order of `graph`.
pub fn parents_first_order(graph: &ProjectGraph) -> Vec<String> {
    let mut order = Vec::with_capacity(graph.len());
    traverse_parents_first(graph, |name| {
        order.push(name.to_string());
        true
    });
    order
}

#[cfg(test)]
#[path = "traverse_tests.rs"]
mod tests;
