// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource locks across pull requests.

use crate::prelude::*;
use std::sync::Barrier;

fn world() -> World<ChangedFilesDetector> {
    World::new(MemoryStore::new(), ChangedFilesDetector::new(), SchedulerConfig::default())
        .with_config(INFRA_TOML)
}

#[test]
fn concurrent_acquire_has_exactly_one_winner() {
    let w = world();
    let key = ResourceKey::new("acme", "infra", "prod", "default");
    for round in 0..50 {
        let barrier = Barrier::new(2);
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = [1, 2]
                .map(|pr| {
                    let (w, key, barrier) = (&w, &key, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        w.scheduler.lock(key, &LockHolder::PullRequest(pr))
                    })
                })
                .into_iter()
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "round {round}: {results:?}");
        assert!(results.iter().any(|r| matches!(
            r,
            Err(SchedulerError::LockConflict(LockConflict::AlreadyLocked { .. }))
        )));

        let holder = w.store.lock(&key).unwrap().unwrap().holder;
        w.scheduler.unlock(&key, &holder).unwrap();
    }
}

#[tokio::test]
async fn apply_lock_blocks_other_pr_until_unlocked() {
    let w = world();
    let files = &["envs/dev/main.tf"];
    let first = pr_event(BatchCommand::Apply, files);
    let batch = w.scheduler.handle_event(&first).await.unwrap().unwrap();
    w.report(&batch, "dev", JobStatus::Succeeded).await;

    let second = VcsEvent::new(pr_trigger_for(7, BatchCommand::Apply))
        .changed_files(vec!["envs/dev/main.tf".to_string()]);
    let err = w.scheduler.handle_event(&second).await.unwrap_err();
    assert!(matches!(err, SchedulerError::LockConflict(LockConflict::AlreadyLocked { .. })));

    w.scheduler.handle_event(&pr_event(BatchCommand::Unlock, files)).await.unwrap();
    assert!(w.scheduler.handle_event(&second).await.unwrap().is_some());
}

#[tokio::test]
async fn closing_pr_releases_all_its_locks() {
    let w = world();
    let files = &["envs/dev/main.tf", "envs/prod/main.tf"];
    w.scheduler.handle_event(&pr_event(BatchCommand::Lock, files)).await.unwrap();
    assert_eq!(w.store.tables().resource_locks.len(), 2);

    let released = w.scheduler.unlock_all(&LockHolder::PullRequest(42), &infra()).unwrap();

    assert_eq!(released.len(), 2);
    assert!(w.store.tables().resource_locks.is_empty());
}
