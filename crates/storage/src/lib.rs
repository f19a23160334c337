// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! graft-storage: the shared transactional store
//!
//! The scheduler keeps no authoritative state in process. Every job, batch
//! and lock transition is a short row-atomic operation on a [`Store`].

mod memory;
mod snapshot;
mod store;
mod tables;

pub use memory::MemoryStore;
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use store::{LockRemoval, StatusUpdate, Store, StoreError};
pub use tables::Tables;
