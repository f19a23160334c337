// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for scheduler specs.

pub use graft_adapters::{
    ChangedFilesDetector, FakeAutoMerger, FakeDispatcher, FakeNotifier, ImpactDetector,
    StaticImpactDetector,
};
pub use graft_config::{FileConfigProvider, StrConfigProvider};
pub use graft_core::test_support::{pr_trigger, pr_trigger_for};
pub use graft_core::{
    BatchCommand, BatchId, BatchStatus, FakeClock, Job, JobStatus, LockHolder, RepoRef,
    ResourceKey, VcsEvent,
};
pub use graft_engine::{LockConflict, Scheduler, SchedulerConfig, SchedulerDeps, SchedulerError};
pub use graft_storage::{MemoryStore, Store};

/// Configuration of the `acme/infra` repository used across scenarios.
pub const INFRA_TOML: &str = r#"
auto_merge = true

[project.dev]
dir = "envs/dev"

[project.prod]
dir = "envs/prod"
depends_on = ["dev"]
"#;

pub fn infra() -> RepoRef {
    RepoRef::new("acme", "infra")
}

pub type SpecScheduler<I> =
    Scheduler<MemoryStore, FakeDispatcher, FakeNotifier, FakeAutoMerger, I, FakeClock>;

/// A scheduler plus handles on its store and fakes.
pub struct World<I: ImpactDetector> {
    pub scheduler: SpecScheduler<I>,
    pub store: MemoryStore,
    pub dispatcher: FakeDispatcher,
    pub notifier: FakeNotifier,
    pub merger: FakeAutoMerger,
}

impl<I: ImpactDetector> World<I> {
    pub fn new(store: MemoryStore, detector: I, config: SchedulerConfig) -> Self {
        let (dispatcher, notifier, merger) =
            (FakeDispatcher::new(), FakeNotifier::new(), FakeAutoMerger::new());
        let deps = SchedulerDeps {
            store: store.clone(),
            dispatcher: dispatcher.clone(),
            notifier: notifier.clone(),
            merger: merger.clone(),
            detector,
        };
        let scheduler = Scheduler::new(deps, FakeClock::new(), config);
        Self { scheduler, store, dispatcher, notifier, merger }
    }

    /// Load `toml` as the configuration of `acme/infra`.
    pub fn with_config(self, toml: &str) -> Self {
        self.scheduler.load_projects(&infra(), &StrConfigProvider::toml(toml)).unwrap();
        self
    }

    pub fn job(&self, batch: &BatchId, project: &str) -> Job {
        self.store
            .jobs_for_batch(batch)
            .unwrap()
            .into_iter()
            .find(|j| j.project == project)
            .unwrap_or_else(|| panic!("no job for {project}"))
    }

    pub fn status(&self, batch: &BatchId, project: &str) -> JobStatus {
        self.job(batch, project).status
    }

    pub fn batch_status(&self, batch: &BatchId) -> BatchStatus {
        self.store.batch(batch).unwrap().unwrap().status
    }

    pub async fn report(&self, batch: &BatchId, project: &str, status: JobStatus) {
        let job = self.job(batch, project);
        self.scheduler.report_job_status(&job.id, status, None).await.unwrap();
    }
}

/// An event on PR #42 touching `files`.
pub fn pr_event(command: BatchCommand, files: &[&str]) -> VcsEvent {
    VcsEvent::new(pr_trigger(command)).changed_files(files.iter().map(|f| f.to_string()).collect())
}
