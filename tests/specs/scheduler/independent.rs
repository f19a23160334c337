// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three independent projects.

use crate::prelude::*;

const ABC_TOML: &str = r#"
[project.a]
dir = "a"

[project.b]
dir = "b"

[project.c]
dir = "c"
"#;

#[tokio::test]
async fn all_dispatched_without_links() {
    let w = World::new(MemoryStore::new(), StaticImpactDetector::all(), SchedulerConfig::default())
        .with_config(ABC_TOML);

    let event = pr_event(BatchCommand::Plan, &[]);
    let batch = w.scheduler.handle_event(&event).await.unwrap().unwrap();

    assert_eq!(w.dispatcher.projects(), vec!["a", "b", "c"]);
    assert!(w.store.tables().job_parent_links.is_empty());

    w.report(&batch, "a", JobStatus::Succeeded).await;
    w.report(&batch, "b", JobStatus::Failed).await;
    assert_eq!(w.batch_status(&batch), BatchStatus::Failed);

    // A sibling failure does not stop independent work from finishing
    w.report(&batch, "c", JobStatus::Succeeded).await;
    assert_eq!(w.status(&batch, "c"), JobStatus::Succeeded);
    assert_eq!(w.batch_status(&batch), BatchStatus::Failed);
}
