// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource locks: `Unlocked → Locked(holder) → Unlocked`.

use crate::error::{LockConflict, SchedulerError};
use graft_core::{BatchCommand, Clock, LockHolder, RepoRef, ResourceKey, ResourceLock};
use graft_storage::{LockRemoval, Store};

/// What a command does to the locks of its projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    /// Read-only command
    None,
    Acquire,
    Release,
}

/// `plan` takes no lock. `apply` and `lock` acquire, and `unlock` releases.
/// Apply locks are kept after success until an explicit unlock or PR cleanup.
pub fn lock_action(command: BatchCommand) -> LockAction {
    match command {
        BatchCommand::Plan => LockAction::None,
        BatchCommand::Apply | BatchCommand::Lock => LockAction::Acquire,
        BatchCommand::Unlock => LockAction::Release,
    }
}

/// Outcome of a successful acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Created,
    /// The same holder already held it; nothing was written
    AlreadyHeld,
}

/// Lock operations over a [`Store`].
pub struct ResourceLocks<'a, S, C> {
    store: &'a S,
    clock: &'a C,
}

impl<'a, S: Store, C: Clock> ResourceLocks<'a, S, C> {
    pub fn new(store: &'a S, clock: &'a C) -> Self {
        Self { store, clock }
    }

    /// Atomic insert-if-absent. Re-acquiring by the same holder is a no-op.
    pub fn acquire(
        &self,
        key: &ResourceKey,
        holder: &LockHolder,
    ) -> Result<Acquired, SchedulerError> {
        let lock = ResourceLock::new(key.clone(), holder.clone(), self.clock.epoch_ms());
        match self.store.try_insert_lock(lock)? {
            None => {
                tracing::info!(%key, %holder, "lock acquired");
                Ok(Acquired::Created)
            }
            Some(existing) if existing.holder == *holder => Ok(Acquired::AlreadyHeld),
            Some(existing) => {
                tracing::info!(%key, %holder, held_by = %existing.holder, "lock conflict");
                Err(LockConflict::AlreadyLocked { key: key.clone(), holder: existing.holder }
                    .into())
            }
        }
    }

    /// Holder-scoped release.
    pub fn release(&self, key: &ResourceKey, holder: &LockHolder) -> Result<(), SchedulerError> {
        match self.store.delete_lock_if_held(key, holder)? {
            LockRemoval::Removed => {
                tracing::info!(%key, %holder, "lock released");
                Ok(())
            }
            LockRemoval::Absent => Err(LockConflict::NotLocked { key: key.clone() }.into()),
            LockRemoval::HeldBy(current) => Err(LockConflict::NotHolder {
                key: key.clone(),
                holder: current,
                requester: holder.clone(),
            }
            .into()),
        }
    }

    /// Release every lock `holder` has in `scope`. Never fails on absence.
    pub fn release_all_for_holder(
        &self,
        holder: &LockHolder,
        scope: &RepoRef,
    ) -> Result<Vec<ResourceKey>, SchedulerError> {
        let released = self.store.delete_locks_for_holder(holder, scope)?;
        if !released.is_empty() {
            tracing::info!(%holder, repo = %scope, count = released.len(), "locks released");
        }
        Ok(released)
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
