// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reporting batch and job status to an external surface.

use async_trait::async_trait;
use graft_core::{Batch, Job, JobStatus};
use thiserror::Error;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Informed after every job or batch status change.
#[async_trait]
pub trait Notifier: Clone + Send + Sync + 'static {
    /// Publish the current status of a batch and its jobs
    async fn report(&self, batch: &Batch, jobs: &[Job]) -> Result<(), NotifyError>;

    /// Post a free-form message about a batch (warnings, merge failures)
    async fn comment(&self, batch: &Batch, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that reports status as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn report(&self, batch: &Batch, jobs: &[Job]) -> Result<(), NotifyError> {
        let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
        tracing::info!(
            batch_id = %batch.id,
            repo = %batch.trigger.repo(),
            command = %batch.trigger.command,
            status = %batch.status,
            created = count(JobStatus::Created),
            triggered = count(JobStatus::Triggered),
            started = count(JobStatus::Started),
            succeeded = count(JobStatus::Succeeded),
            failed = count(JobStatus::Failed),
            "batch status"
        );
        for job in jobs {
            tracing::debug!(
                batch_id = %batch.id,
                job_id = %job.id,
                project = %job.project,
                status = %job.status,
                workflow_ref = job.workflow_ref.as_deref().unwrap_or(""),
                "job status"
            );
        }
        Ok(())
    }

    async fn comment(&self, batch: &Batch, message: &str) -> Result<(), NotifyError> {
        tracing::warn!(batch_id = %batch.id, repo = %batch.trigger.repo(), %message, "batch comment");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Notifier, NotifyError};
    use async_trait::async_trait;
    use graft_core::{Batch, BatchId, BatchStatus, Job, JobStatus};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded notification
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum NotifyCall {
        Report { batch_id: BatchId, status: BatchStatus, jobs: Vec<(String, JobStatus)> },
        Comment { batch_id: BatchId, message: String },
    }

    #[derive(Default)]
    struct FakeNotifyState {
        calls: Vec<NotifyCall>,
        failing: bool,
    }

    /// Fake notifier for testing
    #[derive(Clone, Default)]
    pub struct FakeNotifier {
        inner: Arc<Mutex<FakeNotifyState>>,
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded notifications
        pub fn calls(&self) -> Vec<NotifyCall> {
            self.inner.lock().calls.clone()
        }

        /// Batch statuses from every report, in order
        pub fn reported_statuses(&self) -> Vec<BatchStatus> {
            self.inner
                .lock()
                .calls
                .iter()
                .filter_map(|c| match c {
                    NotifyCall::Report { status, .. } => Some(*status),
                    NotifyCall::Comment { .. } => None,
                })
                .collect()
        }

        pub fn comments(&self) -> Vec<String> {
            self.inner
                .lock()
                .calls
                .iter()
                .filter_map(|c| match c {
                    NotifyCall::Comment { message, .. } => Some(message.clone()),
                    NotifyCall::Report { .. } => None,
                })
                .collect()
        }

        /// Fail every call while set (calls are still recorded)
        pub fn set_failing(&self, failing: bool) {
            self.inner.lock().failing = failing;
        }
    }

    impl FakeNotifyState {
        fn record(&mut self, call: NotifyCall) -> Result<(), NotifyError> {
            self.calls.push(call);
            if self.failing {
                return Err(NotifyError::SendFailed("fake notifier is down".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn report(&self, batch: &Batch, jobs: &[Job]) -> Result<(), NotifyError> {
            self.inner.lock().record(NotifyCall::Report {
                batch_id: batch.id.clone(),
                status: batch.status,
                jobs: jobs.iter().map(|j| (j.project.clone(), j.status)).collect(),
            })
        }

        async fn comment(&self, batch: &Batch, message: &str) -> Result<(), NotifyError> {
            self.inner
                .lock()
                .record(NotifyCall::Comment { batch_id: batch.id.clone(), message: message.to_string() })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifier, NotifyCall};

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
