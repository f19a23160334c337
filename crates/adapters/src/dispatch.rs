// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Starting CI runs for released jobs.

use async_trait::async_trait;
use graft_core::{Job, TriggerContext};
use thiserror::Error;

/// Errors from dispatch operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("CI rejected job {job_id}: {reason}")]
    Rejected { job_id: String, reason: String },
    #[error("CI unavailable: {0}")]
    Unavailable(String),
}

/// Requests external execution of a released job.
///
/// Implementations must tolerate at-least-once delivery: the scheduler
/// guards the `Created → Triggered` transition, but a retried scheduler call
/// may still reach the dispatcher twice for the same job.
#[async_trait]
pub trait Dispatcher: Clone + Send + Sync + 'static {
    async fn dispatch(&self, job: &Job, trigger: &TriggerContext) -> Result<(), DispatchError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{DispatchError, Dispatcher};
    use async_trait::async_trait;
    use graft_core::{BatchCommand, Job, JobId, TriggerContext};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Recorded dispatch
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DispatchCall {
        pub job_id: JobId,
        pub project: String,
        pub workflow_file: String,
        pub command: BatchCommand,
    }

    #[derive(Default)]
    struct FakeDispatchState {
        calls: Vec<DispatchCall>,
        failing_projects: HashSet<String>,
        unavailable: bool,
    }

    /// Fake dispatcher for testing
    #[derive(Clone, Default)]
    pub struct FakeDispatcher {
        inner: Arc<Mutex<FakeDispatchState>>,
    }

    impl FakeDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded dispatches, including failed attempts
        pub fn calls(&self) -> Vec<DispatchCall> {
            self.inner.lock().calls.clone()
        }

        /// Projects dispatched so far, in call order
        pub fn projects(&self) -> Vec<String> {
            self.inner.lock().calls.iter().map(|c| c.project.clone()).collect()
        }

        /// Reject every dispatch for `project`
        pub fn fail_project(&self, project: &str) {
            self.inner.lock().failing_projects.insert(project.to_string());
        }

        /// Fail every dispatch while set
        pub fn set_unavailable(&self, unavailable: bool) {
            self.inner.lock().unavailable = unavailable;
        }

        pub fn clear_failures(&self) {
            let mut state = self.inner.lock();
            state.failing_projects.clear();
            state.unavailable = false;
        }
    }

    #[async_trait]
    impl Dispatcher for FakeDispatcher {
        async fn dispatch(&self, job: &Job, trigger: &TriggerContext) -> Result<(), DispatchError> {
            let mut state = self.inner.lock();
            state.calls.push(DispatchCall {
                job_id: job.id.clone(),
                project: job.project.clone(),
                workflow_file: job.workflow_file.clone(),
                command: trigger.command,
            });
            if state.unavailable {
                return Err(DispatchError::Unavailable("fake CI is down".to_string()));
            }
            if state.failing_projects.contains(&job.project) {
                return Err(DispatchError::Rejected {
                    job_id: job.id.to_string(),
                    reason: format!("project {} is configured to fail", job.project),
                });
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{DispatchCall, FakeDispatcher};

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
