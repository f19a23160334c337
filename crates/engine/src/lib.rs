// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! graft-engine: turns impacted projects into a DAG of jobs and drives it
//!
//! - [`reduce`] projects the full project graph onto the impacted set
//! - [`traverse`] visits a graph parent-first from a synthetic root
//! - [`materialize`] persists one job per project plus parent links
//! - [`cascade`] releases children once all their parents succeeded
//! - [`status`] rolls job statuses up into the batch status
//! - [`locks`] serializes commands per project workspace
//!
//! [`Scheduler`] ties these to the store and the external collaborators.

pub mod cascade;
mod error;
pub mod locks;
pub mod materialize;
pub mod reduce;
pub mod release;
mod scheduler;
pub mod status;
pub mod traverse;

pub use cascade::{on_job_succeeded, CascadeOutcome};
pub use error::{LockConflict, SchedulerError};
pub use locks::{lock_action, Acquired, LockAction, ResourceLocks};
pub use materialize::{materialize, Materialized};
pub use reduce::reduce;
pub use release::{release, Release};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerDeps, StatusReport};
pub use status::{recompute, BatchRollup};
pub use traverse::{parents_first_order, traverse_parents_first};
