// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use graft_adapters::{FakeAutoMerger, FakeDispatcher, FakeImpactDetector, FakeNotifier};
use graft_config::StrConfigProvider;
use graft_core::test_support::{pr_trigger, pr_trigger_for, project};
use graft_core::{FakeClock, Project};
use graft_storage::MemoryStore;

type TestScheduler = Scheduler<
    MemoryStore,
    FakeDispatcher,
    FakeNotifier,
    FakeAutoMerger,
    FakeImpactDetector,
    FakeClock,
>;

struct Harness {
    scheduler: TestScheduler,
    store: MemoryStore,
    dispatcher: FakeDispatcher,
    notifier: FakeNotifier,
    merger: FakeAutoMerger,
    detector: FakeImpactDetector,
}

fn repo() -> RepoRef {
    RepoRef::new("acme", "infra")
}

fn dev_prod() -> Vec<Project> {
    vec![project("dev", &[]), project("prod", &["dev"])]
}

fn harness_with(
    projects: Vec<Project>,
    detector: FakeImpactDetector,
    config: SchedulerConfig,
) -> Harness {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").with_test_writer().try_init();
    let store = MemoryStore::new();
    store.replace_projects(&repo(), projects).unwrap();
    let (dispatcher, notifier, merger) =
        (FakeDispatcher::new(), FakeNotifier::new(), FakeAutoMerger::new());
    let deps = SchedulerDeps {
        store: store.clone(),
        dispatcher: dispatcher.clone(),
        notifier: notifier.clone(),
        merger: merger.clone(),
        detector: detector.clone(),
    };
    let scheduler = Scheduler::new(deps, FakeClock::new(), config);
    Harness { scheduler, store, dispatcher, notifier, merger, detector }
}

fn harness(projects: Vec<Project>) -> Harness {
    harness_with(projects, FakeImpactDetector::all(), SchedulerConfig::default())
}

impl Harness {
    async fn run(&self, event: VcsEvent) -> BatchId {
        self.scheduler.handle_event(&event).await.unwrap().unwrap()
    }

    async fn apply(&self) -> BatchId {
        self.run(VcsEvent::new(pr_trigger(BatchCommand::Apply))).await
    }

    fn job(&self, batch: &BatchId, project: &str) -> Job {
        self.store
            .jobs_for_batch(batch)
            .unwrap()
            .into_iter()
            .find(|j| j.project == project)
            .unwrap()
    }

    async fn report(&self, batch: &BatchId, project: &str, status: JobStatus) -> StatusReport {
        let job = self.job(batch, project);
        self.scheduler.report_job_status(&job.id, status, None).await.unwrap()
    }

    fn batch_status(&self, batch: &BatchId) -> BatchStatus {
        self.store.batch(batch).unwrap().unwrap().status
    }

    fn holder_of(&self, project: &str) -> Option<LockHolder> {
        let key = ResourceKey::new("acme", "infra", project, "default");
        self.store.lock(&key).unwrap().map(|l| l.holder)
    }
}

// ── batches and the cascade ─────────────────────────────────────────────

#[tokio::test]
async fn dev_success_releases_prod() {
    let h = harness(dev_prod());
    let batch = h.apply().await;

    assert_eq!(h.dispatcher.projects(), vec!["dev"]);
    assert_eq!(h.job(&batch, "prod").status, JobStatus::Created);

    let report = h.report(&batch, "dev", JobStatus::Succeeded).await;
    assert_eq!(report.dispatched, vec![h.job(&batch, "prod").id]);
    assert_eq!(report.batch_status, BatchStatus::Running);
    assert_eq!(h.job(&batch, "prod").status, JobStatus::Triggered);

    let report = h.report(&batch, "prod", JobStatus::Succeeded).await;
    assert_eq!(report.batch_status, BatchStatus::Succeeded);
    assert_eq!(h.dispatcher.projects(), vec!["dev", "prod"]);
}

#[tokio::test]
async fn dev_failure_fails_batch_and_halts_prod() {
    let h = harness(dev_prod());
    let batch = h.apply().await;

    h.report(&batch, "dev", JobStatus::Started).await;
    let report = h.report(&batch, "dev", JobStatus::Failed).await;

    assert_eq!(report.batch_status, BatchStatus::Failed);
    assert!(report.dispatched.is_empty());
    assert_eq!(h.job(&batch, "prod").status, JobStatus::Created);
    assert_eq!(h.dispatcher.projects(), vec!["dev"]);
}

#[tokio::test]
async fn report_for_undispatched_job_is_rejected() {
    let h = harness(dev_prod());
    let batch = h.apply().await;
    h.report(&batch, "dev", JobStatus::Failed).await;

    let prod = h.job(&batch, "prod");
    let err =
        h.scheduler.report_job_status(&prod.id, JobStatus::Succeeded, None).await.unwrap_err();

    assert!(matches!(
        err,
        SchedulerError::InvalidTransition {
            from: JobStatus::Created,
            to: JobStatus::Succeeded,
            ..
        }
    ));
    assert_eq!(h.job(&batch, "prod").status, JobStatus::Created);
    assert_eq!(h.batch_status(&batch), BatchStatus::Failed);
    assert_eq!(h.dispatcher.projects(), vec!["dev"]);
}

#[tokio::test]
async fn independent_projects_dispatch_immediately() {
    let h = harness(vec![project("a", &[]), project("b", &[]), project("c", &[])]);
    let batch = h.apply().await;

    assert_eq!(h.dispatcher.projects(), vec!["a", "b", "c"]);
    let jobs = h.store.jobs_for_batch(&batch).unwrap();
    assert!(jobs.iter().all(|j| j.status == JobStatus::Triggered));
}

#[tokio::test]
async fn skipped_project_is_compressed_through() {
    let projects = vec![project("net", &[]), project("db", &["net"]), project("app", &["db"])];
    let h = harness_with(projects, FakeImpactDetector::named(["net", "app"]), Default::default());
    let batch = h.apply().await;

    assert_eq!(h.store.jobs_for_batch(&batch).unwrap().len(), 2);
    assert_eq!(h.dispatcher.projects(), vec!["net"]);
    h.report(&batch, "net", JobStatus::Succeeded).await;
    assert_eq!(h.dispatcher.projects(), vec!["net", "app"]);
}

#[tokio::test]
async fn backwards_report_is_rejected() {
    let h = harness(dev_prod());
    let batch = h.apply().await;
    h.report(&batch, "dev", JobStatus::Succeeded).await;

    let job = h.job(&batch, "dev");
    let err = h.scheduler.report_job_status(&job.id, JobStatus::Started, None).await.unwrap_err();

    assert!(matches!(
        err,
        SchedulerError::InvalidTransition {
            from: JobStatus::Succeeded,
            to: JobStatus::Started,
            ..
        }
    ));
    assert_eq!(h.job(&batch, "dev").status, JobStatus::Succeeded);
}

#[tokio::test]
async fn redelivered_success_does_not_redispatch() {
    let h = harness(dev_prod());
    let batch = h.apply().await;

    h.report(&batch, "dev", JobStatus::Succeeded).await;
    let again = h.report(&batch, "dev", JobStatus::Succeeded).await;

    assert_eq!(again.update, StatusUpdate::Unchanged);
    assert!(again.dispatched.is_empty());
    assert_eq!(h.dispatcher.projects(), vec!["dev", "prod"]);
}

#[tokio::test]
async fn success_records_summary() {
    let h = harness(vec![project("dev", &[])]);
    let batch = h.apply().await;
    let job = h.job(&batch, "dev");
    let summary =
        JobSummary { resources_created: 3, resources_updated: 1, resources_deleted: 0 };

    h.scheduler.report_job_status(&job.id, JobStatus::Succeeded, Some(summary)).await.unwrap();

    assert_eq!(h.job(&batch, "dev").summary, Some(summary));
}

#[tokio::test]
async fn unknown_job_is_reported() {
    let h = harness(dev_prod());
    let err = h
        .scheduler
        .report_job_status(&JobId::new("job-ghost"), JobStatus::Started, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownJob(_)));
}

#[tokio::test]
async fn workflow_ref_is_stored() {
    let h = harness(vec![project("dev", &[])]);
    let batch = h.apply().await;
    let job = h.job(&batch, "dev");

    h.scheduler.set_workflow_ref(&job.id, "https://ci.example/runs/17").unwrap();

    assert_eq!(h.job(&batch, "dev").workflow_ref.as_deref(), Some("https://ci.example/runs/17"));
    let err = h.scheduler.set_workflow_ref(&JobId::new("job-ghost"), "x").unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownJob(_)));
}

#[tokio::test]
async fn work_items_carry_command_and_vars() {
    let h = harness(vec![Project::new("dev").dir("envs/dev")]);
    let batch = h.run(VcsEvent::new(pr_trigger(BatchCommand::Plan)).var("region", "eu")).await;

    let item = h.job(&batch, "dev").work_item;
    assert_eq!(item.command, "plan");
    assert_eq!(item.vars.get("region").map(String::as_str), Some("eu"));
    assert_eq!(item.vars.get("dir").map(String::as_str), Some("envs/dev"));
}

#[tokio::test]
async fn dispatch_failure_leaves_root_created_for_retry() {
    let h = harness(vec![project("a", &[]), project("b", &[]), project("c", &[])]);
    h.dispatcher.fail_project("b");
    let event = VcsEvent::new(pr_trigger(BatchCommand::Plan));

    let err = h.scheduler.handle_event(&event).await.unwrap_err();

    let SchedulerError::Dispatch { batch_id, job_id, .. } = err else {
        panic!("expected dispatch error");
    };
    assert_eq!(h.job(&batch_id, "b").id, job_id);
    assert_eq!(h.job(&batch_id, "b").status, JobStatus::Created);
    assert_eq!(h.job(&batch_id, "c").status, JobStatus::Triggered);

    h.dispatcher.clear_failures();
    let retried = h.scheduler.dispatch_pending_roots(&batch_id).await.unwrap();
    assert_eq!(retried, vec![job_id]);
}

#[tokio::test]
async fn empty_impacted_set_is_rejected() {
    let h = harness(dev_prod());
    let meta = BatchMeta::new(pr_trigger(BatchCommand::Plan));
    let err =
        h.scheduler.create_batch(&ImpactedSet::new(), &HashMap::new(), meta).await.unwrap_err();
    assert!(matches!(err, SchedulerError::EmptyBatch));
}

#[tokio::test]
async fn missing_work_item_is_rejected() {
    let h = harness(dev_prod());
    let impacted = graft_core::impacted_set(dev_prod());
    let items = HashMap::from([("dev".to_string(), WorkItem::new("plan"))]);
    let meta = BatchMeta::new(pr_trigger(BatchCommand::Plan));

    let err = h.scheduler.create_batch(&impacted, &items, meta).await.unwrap_err();

    assert!(matches!(err, SchedulerError::MissingWorkItem(ref p) if p == "prod"));
    assert!(h.dispatcher.calls().is_empty());
}

#[tokio::test]
async fn apply_missing_work_item_takes_no_locks() {
    let h = harness(dev_prod());
    let impacted = graft_core::impacted_set(dev_prod());
    let items = HashMap::from([("dev".to_string(), WorkItem::new("apply"))]);
    let meta = BatchMeta::new(pr_trigger(BatchCommand::Apply));

    let err = h.scheduler.create_batch(&impacted, &items, meta).await.unwrap_err();

    assert!(matches!(err, SchedulerError::MissingWorkItem(ref p) if p == "prod"));
    assert!(h.store.tables().resource_locks.is_empty());
    assert!(h.store.tables().batches.is_empty());
}

// Two lock writes come first, then the batch and one job per project.
#[yare::parameterized(
    batch_write = { 2 },
    job_write   = { 3 },
)]
#[test_macro(tokio::test)]
async fn apply_store_failure_releases_its_locks(writes_before_failure: usize) {
    let h = harness(dev_prod());
    h.store.fail_one_write_after(writes_before_failure);

    let err = h.scheduler.handle_event(&VcsEvent::new(pr_trigger(BatchCommand::Apply))).await;

    assert!(matches!(err, Err(SchedulerError::Persistence(_))), "got {err:?}");
    assert!(h.store.tables().resource_locks.is_empty());
    assert!(h.dispatcher.calls().is_empty());
}

#[tokio::test]
async fn apply_store_failure_keeps_locks_held_before() {
    let h = harness(dev_prod());
    let pr = LockHolder::PullRequest(42);
    h.scheduler.lock(&ResourceKey::new("acme", "infra", "dev", "default"), &pr).unwrap();
    h.store.fail_one_write_after(2);

    let err = h.scheduler.handle_event(&VcsEvent::new(pr_trigger(BatchCommand::Apply))).await;

    assert!(matches!(err, Err(SchedulerError::Persistence(_))), "got {err:?}");
    assert_eq!(h.holder_of("dev"), Some(pr));
    assert_eq!(h.holder_of("prod"), None);
}

#[tokio::test]
async fn notifier_failure_does_not_fail_scheduling() {
    let h = harness(dev_prod());
    h.notifier.set_failing(true);

    let batch = h.apply().await;
    h.report(&batch, "dev", JobStatus::Succeeded).await;

    assert_eq!(h.dispatcher.projects(), vec!["dev", "prod"]);
    assert!(!h.notifier.calls().is_empty());
}

#[tokio::test]
async fn reports_follow_batch_status() {
    let h = harness(vec![project("dev", &[])]);
    let batch = h.apply().await;
    h.report(&batch, "dev", JobStatus::Succeeded).await;

    let statuses = h.notifier.reported_statuses();
    assert_eq!(statuses.first(), Some(&BatchStatus::Running));
    assert_eq!(statuses.last(), Some(&BatchStatus::Succeeded));
}

// ── impact detection ────────────────────────────────────────────────────

#[tokio::test]
async fn nothing_impacted_creates_no_batch() {
    let h = harness_with(
        dev_prod(),
        FakeImpactDetector::named(Vec::<String>::new()),
        SchedulerConfig::default(),
    );
    let event = VcsEvent::new(pr_trigger(BatchCommand::Apply));

    assert_eq!(h.scheduler.handle_event(&event).await.unwrap(), None);
    assert!(h.store.tables().batches.is_empty());
}

#[tokio::test]
async fn detection_failure_is_surfaced() {
    let h = harness(dev_prod());
    h.detector.set_unavailable(true);
    let event = VcsEvent::new(pr_trigger(BatchCommand::Plan));

    let err = h.scheduler.handle_event(&event).await.unwrap_err();

    assert!(matches!(err, SchedulerError::ImpactDetection(_)));
    assert_eq!(h.detector.calls(), 1);
}

#[tokio::test]
async fn project_filter_runs_one_project() {
    let h = harness(dev_prod());
    let batch =
        h.run(VcsEvent::new(pr_trigger(BatchCommand::Plan)).project_filter("prod")).await;

    let jobs = h.store.jobs_for_batch(&batch).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].project, "prod");
    assert!(!h.store.batch(&batch).unwrap().unwrap().covers_all_impacted);
}

#[tokio::test]
async fn project_filter_must_be_impacted() {
    let h = harness_with(dev_prod(), FakeImpactDetector::named(["dev"]), Default::default());
    let event = VcsEvent::new(pr_trigger(BatchCommand::Plan)).project_filter("prod");

    let err = h.scheduler.handle_event(&event).await.unwrap_err();

    assert!(matches!(err, SchedulerError::ProjectNotImpacted(ref p) if p == "prod"));
}

// ── configuration ───────────────────────────────────────────────────────

#[test]
fn load_projects_stores_validated_graph() {
    let h = harness(Vec::new());
    let provider = StrConfigProvider::toml("[project.dev]\n[project.prod]\ndepends_on = [\"dev\"]\n");

    let graph = h.scheduler.load_projects(&repo(), &provider).unwrap();

    assert!(graph.has_edge("dev", "prod"));
    assert_eq!(h.scheduler.project_graph(&repo()).unwrap(), graph);
}

#[test]
fn invalid_config_stores_nothing() {
    let h = harness(dev_prod());
    let provider = StrConfigProvider::toml(
        "[project.a]\ndepends_on = [\"b\"]\n[project.b]\ndepends_on = [\"a\"]\n",
    );

    let err = h.scheduler.load_projects(&repo(), &provider).unwrap_err();

    assert!(matches!(err, SchedulerError::Config(_)));
    assert_eq!(h.store.projects(&repo()).unwrap(), dev_prod());
}

#[test]
fn config_from_repo_config() {
    let config = graft_config::parse_config("auto_merge = true\npr_locks = false\n").unwrap();
    assert_eq!(
        SchedulerConfig::from(&config),
        SchedulerConfig::default().auto_merge(true).pr_locks(false)
    );
}

// ── auto-merge ──────────────────────────────────────────────────────────

fn merging(projects: Vec<Project>) -> Harness {
    harness_with(projects, FakeImpactDetector::all(), SchedulerConfig::default().auto_merge(true))
}

#[tokio::test]
async fn auto_merge_fires_once_when_apply_succeeds() {
    let h = merging(dev_prod());
    let batch = h.apply().await;

    h.report(&batch, "dev", JobStatus::Succeeded).await;
    assert!(h.merger.merges().is_empty());
    h.report(&batch, "prod", JobStatus::Succeeded).await;
    h.report(&batch, "prod", JobStatus::Succeeded).await;

    assert_eq!(h.merger.merges().len(), 1);
    assert!(h.store.batch(&batch).unwrap().unwrap().merge_triggered);
}

#[yare::parameterized(
    plan    = { BatchCommand::Plan, None },
    partial = { BatchCommand::Apply, Some("dev") },
)]
#[test_macro(tokio::test)]
async fn auto_merge_skipped(command: BatchCommand, filter: Option<&str>) {
    let h = merging(vec![project("dev", &[]), project("prod", &[])]);
    let mut event = VcsEvent::new(pr_trigger(command));
    if let Some(filter) = filter {
        event = event.project_filter(filter);
    }
    let batch = h.run(event).await;

    for job in h.store.jobs_for_batch(&batch).unwrap() {
        h.scheduler.report_job_status(&job.id, JobStatus::Succeeded, None).await.unwrap();
    }

    assert_eq!(h.batch_status(&batch), BatchStatus::Succeeded);
    assert!(h.merger.merges().is_empty());
}

#[tokio::test]
async fn merge_failure_is_commented_not_fatal() {
    let h = merging(vec![project("dev", &[])]);
    h.merger.reject("checks pending");
    let batch = h.apply().await;

    let report = h.report(&batch, "dev", JobStatus::Succeeded).await;

    assert_eq!(report.batch_status, BatchStatus::Succeeded);
    let comments = h.notifier.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].contains("checks pending"), "{comments:?}");
}

// ── locks ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn apply_locks_every_project_and_keeps_them() {
    let h = harness(dev_prod());
    let batch = h.apply().await;
    h.report(&batch, "dev", JobStatus::Succeeded).await;
    h.report(&batch, "prod", JobStatus::Succeeded).await;

    assert_eq!(h.holder_of("dev"), Some(LockHolder::PullRequest(42)));
    assert_eq!(h.holder_of("prod"), Some(LockHolder::PullRequest(42)));
}

#[tokio::test]
async fn plan_takes_no_locks() {
    let h = harness(dev_prod());
    h.run(VcsEvent::new(pr_trigger(BatchCommand::Plan))).await;
    assert!(h.store.tables().resource_locks.is_empty());
}

#[tokio::test]
async fn apply_from_other_pr_conflicts_without_side_effects() {
    let h = harness(dev_prod());
    h.scheduler
        .lock(&ResourceKey::new("acme", "infra", "prod", "default"), &LockHolder::PullRequest(7))
        .unwrap();

    let err = h.scheduler.handle_event(&VcsEvent::new(pr_trigger(BatchCommand::Apply))).await;

    assert!(matches!(
        err,
        Err(SchedulerError::LockConflict(LockConflict::AlreadyLocked { .. }))
    ));
    assert_eq!(h.holder_of("dev"), None);
    assert_eq!(h.holder_of("prod"), Some(LockHolder::PullRequest(7)));
    assert!(h.store.tables().batches.is_empty());
    assert!(h.dispatcher.calls().is_empty());
}

#[tokio::test]
async fn apply_without_pr_locks_ignores_locks() {
    let h = harness_with(
        dev_prod(),
        FakeImpactDetector::all(),
        SchedulerConfig::default().pr_locks(false),
    );
    h.scheduler
        .lock(&ResourceKey::new("acme", "infra", "dev", "default"), &LockHolder::PullRequest(7))
        .unwrap();

    h.apply().await;

    assert_eq!(h.dispatcher.projects(), vec!["dev"]);
    assert_eq!(h.holder_of("prod"), None);
}

#[tokio::test]
async fn lock_and_unlock_commands() {
    let h = harness(dev_prod());
    let lock = VcsEvent::new(pr_trigger(BatchCommand::Lock));
    let unlock = VcsEvent::new(pr_trigger(BatchCommand::Unlock));

    assert_eq!(h.scheduler.handle_event(&lock).await.unwrap(), None);
    assert_eq!(h.holder_of("dev"), Some(LockHolder::PullRequest(42)));
    assert_eq!(h.holder_of("prod"), Some(LockHolder::PullRequest(42)));

    assert_eq!(h.scheduler.handle_event(&unlock).await.unwrap(), None);
    assert!(h.store.tables().resource_locks.is_empty());
    assert!(h.store.tables().batches.is_empty());
}

#[tokio::test]
async fn unlock_releases_dangling_locks_of_the_pr() {
    let h = harness_with(dev_prod(), FakeImpactDetector::named(["dev"]), Default::default());
    let pr = LockHolder::PullRequest(42);
    for name in ["dev", "prod"] {
        h.scheduler.lock(&ResourceKey::new("acme", "infra", name, "default"), &pr).unwrap();
    }

    h.scheduler.handle_event(&VcsEvent::new(pr_trigger(BatchCommand::Unlock))).await.unwrap();

    assert!(h.store.tables().resource_locks.is_empty());
}

#[tokio::test]
async fn filtered_unlock_releases_only_that_project() {
    let h = harness(dev_prod());
    h.scheduler.handle_event(&VcsEvent::new(pr_trigger(BatchCommand::Lock))).await.unwrap();

    let unlock = VcsEvent::new(pr_trigger(BatchCommand::Unlock)).project_filter("prod");
    h.scheduler.handle_event(&unlock).await.unwrap();

    assert_eq!(h.holder_of("dev"), Some(LockHolder::PullRequest(42)));
    assert_eq!(h.holder_of("prod"), None);
}

#[tokio::test]
async fn unlock_by_other_pr_is_rejected() {
    let h = harness(dev_prod());
    h.scheduler.handle_event(&VcsEvent::new(pr_trigger(BatchCommand::Lock))).await.unwrap();

    let unlock = VcsEvent::new(pr_trigger_for(9, BatchCommand::Unlock));
    let err = h.scheduler.handle_event(&unlock).await.unwrap_err();

    assert!(matches!(err, SchedulerError::LockConflict(LockConflict::NotHolder { .. })));
    assert_eq!(h.holder_of("dev"), Some(LockHolder::PullRequest(42)));
}

#[tokio::test]
async fn lock_commands_are_noops_without_pr_locks() {
    let h = harness_with(
        dev_prod(),
        FakeImpactDetector::all(),
        SchedulerConfig::default().pr_locks(false),
    );
    h.scheduler.handle_event(&VcsEvent::new(pr_trigger(BatchCommand::Lock))).await.unwrap();
    assert!(h.store.tables().resource_locks.is_empty());
}

#[test]
fn unlock_all_is_scoped_to_repo() {
    let h = harness(dev_prod());
    let pr = LockHolder::PullRequest(42);
    h.scheduler.lock(&ResourceKey::new("acme", "infra", "dev", "default"), &pr).unwrap();
    h.scheduler.lock(&ResourceKey::new("acme", "apps", "web", "default"), &pr).unwrap();

    let released = h.scheduler.unlock_all(&pr, &repo()).unwrap();

    assert_eq!(released, vec![ResourceKey::new("acme", "infra", "dev", "default")]);
    assert_eq!(h.store.tables().resource_locks.len(), 1);
}
