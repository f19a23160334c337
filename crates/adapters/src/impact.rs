// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deciding which projects a VCS event affects.

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use graft_core::{ImpactedSet, Project, ProjectGraph, VcsEvent};
use thiserror::Error;

/// Errors from impact detection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImpactDetectionError {
    #[error("impact detection unavailable: {0}")]
    Unavailable(String),
    #[error("project '{project}' has invalid pattern '{pattern}': {message}")]
    InvalidPattern { project: String, pattern: String, message: String },
}

/// Determines the impacted projects for one event.
#[async_trait]
pub trait ImpactDetector: Clone + Send + Sync + 'static {
    async fn detect(
        &self,
        event: &VcsEvent,
        graph: &ProjectGraph,
    ) -> Result<ImpactedSet, ImpactDetectionError>;
}

/// Marks a project impacted when a changed file falls under its directory or
/// include patterns and matches none of its exclude patterns.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChangedFilesDetector;

impl ChangedFilesDetector {
    pub fn new() -> Self {
        Self
    }

    /// Projects of `graph` touched by `changed_files`, in graph order.
    pub fn modified_projects(
        graph: &ProjectGraph,
        changed_files: &[String],
    ) -> Result<ImpactedSet, ImpactDetectionError> {
        let files: Vec<String> = changed_files.iter().map(|f| normalize(f)).collect();
        let mut impacted = ImpactedSet::new();
        for project in graph.projects() {
            let matcher = ProjectMatcher::new(project)?;
            if files.iter().any(|f| matcher.matches(f)) {
                impacted.insert(project.name.clone(), project.clone());
            }
        }
        Ok(impacted)
    }
}

#[async_trait]
impl ImpactDetector for ChangedFilesDetector {
    async fn detect(
        &self,
        event: &VcsEvent,
        graph: &ProjectGraph,
    ) -> Result<ImpactedSet, ImpactDetectionError> {
        let impacted = Self::modified_projects(graph, &event.changed_files)?;
        tracing::debug!(
            changed_files = event.changed_files.len(),
            impacted = impacted.len(),
            "detected impacted projects"
        );
        Ok(impacted)
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

struct ProjectMatcher {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl ProjectMatcher {
    fn new(project: &Project) -> Result<Self, ImpactDetectionError> {
        let compile = |raw: &str| {
            Pattern::new(&normalize(raw)).map_err(|e| ImpactDetectionError::InvalidPattern {
                project: project.name.clone(),
                pattern: raw.to_string(),
                message: e.msg.to_string(),
            })
        };
        let dir_pattern = format!("{}/**/*", project.dir);
        let include = project
            .include_patterns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(dir_pattern.as_str()))
            .map(compile)
            .collect::<Result<_, _>>()?;
        let exclude =
            project.exclude_patterns.iter().map(|p| compile(p)).collect::<Result<_, _>>()?;
        Ok(Self { include, exclude })
    }

    fn matches(&self, file: &str) -> bool {
        self.include.iter().any(|p| p.matches_with(file, MATCH_OPTIONS))
            && !self.exclude.iter().any(|p| p.matches_with(file, MATCH_OPTIONS))
    }
}

/// Resolve `.`/`..` segments and strip leading and duplicate separators so
/// `./envs//dev/main.tf` and `/envs/dev/main.tf` compare equal.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Impacts a fixed set of projects regardless of the event.
///
/// Used for commands that run everything (`graft plan --all`) and for
/// scheduling from a known project list. A named project missing from the
/// graph is still returned so the reducer reports it as a configuration
/// error.
#[derive(Clone, Debug, Default)]
pub struct StaticImpactDetector {
    names: Option<Vec<String>>,
}

impl StaticImpactDetector {
    /// Impact every project in the graph
    pub fn all() -> Self {
        Self { names: None }
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: Some(names.into_iter().map(Into::into).collect()) }
    }

    fn resolve(&self, graph: &ProjectGraph) -> ImpactedSet {
        match &self.names {
            None => graph.projects().map(|p| (p.name.clone(), p.clone())).collect(),
            Some(names) => names
                .iter()
                .map(|n| {
                    let project = graph.project(n).cloned().unwrap_or_else(|| Project::new(n));
                    (n.clone(), project)
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ImpactDetector for StaticImpactDetector {
    async fn detect(
        &self,
        _event: &VcsEvent,
        graph: &ProjectGraph,
    ) -> Result<ImpactedSet, ImpactDetectionError> {
        Ok(self.resolve(graph))
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ImpactDetectionError, ImpactDetector, StaticImpactDetector};
    use async_trait::async_trait;
    use graft_core::{ImpactedSet, ProjectGraph, VcsEvent};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakeImpactState {
        inner: StaticImpactDetector,
        calls: usize,
        unavailable: bool,
    }

    /// Fake impact detector: a [`StaticImpactDetector`] that counts calls and
    /// can be switched to fail.
    #[derive(Clone)]
    pub struct FakeImpactDetector {
        state: Arc<Mutex<FakeImpactState>>,
    }

    impl FakeImpactDetector {
        pub fn new(inner: StaticImpactDetector) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeImpactState { inner, calls: 0, unavailable: false })),
            }
        }

        pub fn all() -> Self {
            Self::new(StaticImpactDetector::all())
        }

        pub fn named<I, S>(names: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::new(StaticImpactDetector::named(names))
        }

        pub fn calls(&self) -> usize {
            self.state.lock().calls
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.state.lock().unavailable = unavailable;
        }
    }

    #[async_trait]
    impl ImpactDetector for FakeImpactDetector {
        async fn detect(
            &self,
            _event: &VcsEvent,
            graph: &ProjectGraph,
        ) -> Result<ImpactedSet, ImpactDetectionError> {
            let mut state = self.state.lock();
            state.calls += 1;
            if state.unavailable {
                return Err(ImpactDetectionError::Unavailable("fake VCS is down".to_string()));
            }
            Ok(state.inner.resolve(graph))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeImpactDetector;

#[cfg(test)]
#[path = "impact_tests.rs"]
mod tests;
