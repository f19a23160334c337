// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::batch::{BatchCommand, TriggerContext};
use crate::project::Project;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core types.
pub mod strategies {
    use crate::job::JobStatus;
    use crate::project::Project;
    use proptest::prelude::*;
    use proptest::sample::Index;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Created),
            Just(JobStatus::Triggered),
            Just(JobStatus::Started),
            Just(JobStatus::Succeeded),
            Just(JobStatus::Failed),
        ]
    }

    /// Up to `max` projects named `p0..pN` forming an acyclic dependency graph.
    ///
    /// Project `pi` only depends on projects with a smaller index, so the
    /// result is acyclic by construction. Declaration order is shuffled.
    pub fn arb_projects(max: usize) -> impl Strategy<Value = Vec<Project>> {
        (0..=max)
            .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(any::<Index>(), 0..3), n))
            .prop_map(|picks| {
                picks
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let project = Project::new(format!("p{i}"));
                        if i == 0 {
                            return project;
                        }
                        project.depends_on(deps.iter().map(|ix| format!("p{}", ix.index(i))))
                    })
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    }

    /// Acyclic projects plus a random subset of their names marked impacted.
    pub fn arb_projects_with_impacted(
        max: usize,
    ) -> impl Strategy<Value = (Vec<Project>, Vec<String>)> {
        arb_projects(max)
            .prop_flat_map(|projects| {
                let n = projects.len();
                (Just(projects), prop::collection::vec(any::<bool>(), n))
            })
            .prop_map(|(projects, mask)| {
                let impacted = projects
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| *keep)
                    .map(|(p, _)| p.name.clone())
                    .collect();
                (projects, impacted)
            })
    }
}

// ── Factory functions ───────────────────────────────────────────────────

/// A project with default dir/workspace depending on `deps`.
pub fn project(name: &str, deps: &[&str]) -> Project {
    Project::new(name).depends_on(deps.iter().copied())
}

/// Trigger for PR #42 on `acme/infra`.
pub fn pr_trigger(command: BatchCommand) -> TriggerContext {
    pr_trigger_for(42, command)
}

pub fn pr_trigger_for(pr: u64, command: BatchCommand) -> TriggerContext {
    TriggerContext::new("acme", "infra", command)
        .pr_number(pr)
        .commit_sha("0123456789abcdef")
        .branch(format!("pr-{pr}"))
}
