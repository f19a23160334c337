// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling survives a restart through a store snapshot.

use crate::prelude::*;

#[tokio::test]
async fn cascade_continues_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graft.snapshot.json");
    let files = &["envs/dev/main.tf", "envs/prod/main.tf"];

    let before = World::new(MemoryStore::new(), ChangedFilesDetector::new(), Default::default())
        .with_config(INFRA_TOML);
    let event = pr_event(BatchCommand::Apply, files);
    let batch = before.scheduler.handle_event(&event).await.unwrap().unwrap();
    before.report(&batch, "dev", JobStatus::Started).await;
    before.store.save_snapshot(&path).unwrap();
    drop(before);

    let store = MemoryStore::load_snapshot(&path).unwrap();
    let after = World::new(store, ChangedFilesDetector::new(), Default::default());

    assert_eq!(after.status(&batch, "dev"), JobStatus::Started);
    let prod_key = ResourceKey::new("acme", "infra", "prod", "default");
    let holder = after.store.lock(&prod_key).unwrap().map(|l| l.holder);
    assert_eq!(holder, Some(LockHolder::PullRequest(42)));

    after.report(&batch, "dev", JobStatus::Succeeded).await;
    assert_eq!(after.status(&batch, "prod"), JobStatus::Triggered);
    assert_eq!(after.dispatcher.projects(), vec!["prod"]);

    after.report(&batch, "prod", JobStatus::Succeeded).await;
    assert_eq!(after.batch_status(&batch), BatchStatus::Succeeded);
}

#[tokio::test]
async fn missing_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::load_snapshot(&dir.path().join("absent.json")).unwrap();
    assert!(store.tables().jobs.is_empty());
    assert!(store.projects(&infra()).unwrap().is_empty());
}
