// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! graft-core: data model for the graft job-graph scheduler

pub mod macros;

pub mod batch;
pub mod clock;
pub mod event;
pub mod graph;
pub mod id;
pub mod job;
pub mod lock;
pub mod project;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use batch::{Batch, BatchCommand, BatchMeta, BatchStatus, TriggerContext};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::VcsEvent;
pub use graph::{GraphError, ProjectGraph};
pub use id::{BatchId, JobId};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{Job, JobParentLink, JobStatus, JobSummary, Transition, WorkItem};
pub use lock::{LockHolder, ResourceKey, ResourceLock};
pub use project::{impacted_set, ImpactedSet, Project, RepoRef, DEFAULT_WORKFLOW_FILE};
