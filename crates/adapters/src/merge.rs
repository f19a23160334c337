// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merging the pull request once an apply batch succeeds.

use async_trait::async_trait;
use graft_core::TriggerContext;
use thiserror::Error;

/// Errors from merge operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("nothing to merge: trigger has no pull request")]
    NoPullRequest,
    #[error("pull request #{pr} is not mergeable: {reason}")]
    NotMergeable { pr: u64, reason: String },
}

/// Merges the pull request behind a trigger.
#[async_trait]
pub trait AutoMerger: Clone + Send + Sync + 'static {
    async fn merge(&self, trigger: &TriggerContext) -> Result<(), MergeError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{AutoMerger, MergeError};
    use async_trait::async_trait;
    use graft_core::TriggerContext;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeMergeState {
        merged: Vec<TriggerContext>,
        reject_reason: Option<String>,
    }

    /// Fake auto-merger for testing
    #[derive(Clone, Default)]
    pub struct FakeAutoMerger {
        inner: Arc<Mutex<FakeMergeState>>,
    }

    impl FakeAutoMerger {
        pub fn new() -> Self {
            Self::default()
        }

        /// Triggers for which a merge was requested
        pub fn merges(&self) -> Vec<TriggerContext> {
            self.inner.lock().merged.clone()
        }

        /// Reject every merge with `reason`
        pub fn reject(&self, reason: &str) {
            self.inner.lock().reject_reason = Some(reason.to_string());
        }
    }

    #[async_trait]
    impl AutoMerger for FakeAutoMerger {
        async fn merge(&self, trigger: &TriggerContext) -> Result<(), MergeError> {
            let mut state = self.inner.lock();
            state.merged.push(trigger.clone());
            let pr = trigger.pr_number.ok_or(MergeError::NoPullRequest)?;
            match &state.reject_reason {
                Some(reason) => Err(MergeError::NotMergeable { pr, reason: reason.clone() }),
                None => Ok(()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAutoMerger;

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
