// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! graft-adapters: collaborators the scheduler calls out to
//!
//! Each collaborator is an async trait. Production adapters live next to
//! their trait; `Fake*` adapters that record calls and inject failures are
//! exported behind the `test-support` feature.

pub mod dispatch;
pub mod impact;
pub mod merge;
pub mod notify;

pub use dispatch::{DispatchError, Dispatcher};
pub use impact::{
    ChangedFilesDetector, ImpactDetectionError, ImpactDetector, StaticImpactDetector,
};
pub use merge::{AutoMerger, MergeError};
pub use notify::{Notifier, NotifyError, TracingNotifier};

#[cfg(any(test, feature = "test-support"))]
pub use dispatch::{DispatchCall, FakeDispatcher};
#[cfg(any(test, feature = "test-support"))]
pub use impact::FakeImpactDetector;
#[cfg(any(test, feature = "test-support"))]
pub use merge::FakeAutoMerger;
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifier, NotifyCall};
