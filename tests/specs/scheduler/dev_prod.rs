// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dev` and `prod` where `prod` depends on `dev`, both impacted.

use crate::prelude::*;

fn world() -> World<ChangedFilesDetector> {
    let config = SchedulerConfig::default().auto_merge(true);
    World::new(MemoryStore::new(), ChangedFilesDetector::new(), config).with_config(INFRA_TOML)
}

const BOTH: &[&str] = &["envs/dev/main.tf", "envs/prod/main.tf"];

#[tokio::test]
async fn dev_success_releases_prod_and_merges() {
    let w = world();
    let event = pr_event(BatchCommand::Apply, BOTH);
    let batch = w.scheduler.handle_event(&event).await.unwrap().unwrap();

    let dev = w.job(&batch, "dev");
    let prod = w.job(&batch, "prod");
    assert_eq!(w.store.links_by_child(&prod.id).unwrap().len(), 1);
    assert_eq!(w.store.links_by_child(&prod.id).unwrap()[0].parent, dev.id);
    assert_eq!(w.dispatcher.projects(), vec!["dev"]);

    w.report(&batch, "dev", JobStatus::Started).await;
    w.report(&batch, "dev", JobStatus::Succeeded).await;
    assert_eq!(w.status(&batch, "prod"), JobStatus::Triggered);
    assert_eq!(w.batch_status(&batch), BatchStatus::Running);

    w.report(&batch, "prod", JobStatus::Succeeded).await;
    assert_eq!(w.batch_status(&batch), BatchStatus::Succeeded);
    assert_eq!(w.merger.merges().len(), 1);
}

#[tokio::test]
async fn dev_failure_fails_batch_before_prod_runs() {
    let w = world();
    let event = pr_event(BatchCommand::Apply, BOTH);
    let batch = w.scheduler.handle_event(&event).await.unwrap().unwrap();

    w.report(&batch, "dev", JobStatus::Failed).await;

    assert_eq!(w.batch_status(&batch), BatchStatus::Failed);
    assert_eq!(w.status(&batch, "prod"), JobStatus::Created);
    assert_eq!(w.dispatcher.projects(), vec!["dev"]);
    assert!(w.merger.merges().is_empty());

    let prod = w.job(&batch, "prod");
    let late = w.scheduler.report_job_status(&prod.id, JobStatus::Succeeded, None).await;
    assert!(matches!(late, Err(SchedulerError::InvalidTransition { .. })));
    assert_eq!(w.status(&batch, "prod"), JobStatus::Created);
    assert_eq!(w.batch_status(&batch), BatchStatus::Failed);
}

#[tokio::test]
async fn only_changed_project_is_scheduled() {
    let w = world();
    let event = pr_event(BatchCommand::Plan, &["envs/prod/variables.tf"]);
    let batch = w.scheduler.handle_event(&event).await.unwrap().unwrap();

    let jobs = w.store.jobs_for_batch(&batch).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].project, "prod");
    assert_eq!(w.dispatcher.projects(), vec!["prod"]);
}

#[tokio::test]
async fn unrelated_change_schedules_nothing() {
    let w = world();
    let event = pr_event(BatchCommand::Plan, &["docs/README.md"]);

    assert_eq!(w.scheduler.handle_event(&event).await.unwrap(), None);
    assert!(w.dispatcher.calls().is_empty());
}

#[tokio::test]
async fn config_loaded_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graft.toml");
    std::fs::write(&path, INFRA_TOML).unwrap();
    let w = World::new(MemoryStore::new(), ChangedFilesDetector::new(), SchedulerConfig::default());

    let graph = w.scheduler.load_projects(&infra(), &FileConfigProvider::new(&path)).unwrap();

    assert!(graph.has_edge("dev", "prod"));
    assert_eq!(w.store.projects(&infra()).unwrap().len(), 2);
}
