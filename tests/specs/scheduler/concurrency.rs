// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion callbacks arriving concurrently from independent workers.

use crate::prelude::*;
use std::sync::Arc;

const DIAMOND_TOML: &str = r#"
[project.base]
dir = "base"

[project.left]
dir = "left"
depends_on = ["base"]

[project.right]
dir = "right"
depends_on = ["base"]

[project.top]
dir = "top"
depends_on = ["left", "right"]
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sibling_completions_release_shared_child_once() {
    for _ in 0..25 {
        let w = Arc::new(
            World::new(MemoryStore::new(), StaticImpactDetector::all(), Default::default())
                .with_config(DIAMOND_TOML),
        );
        let event = pr_event(BatchCommand::Apply, &[]);
        let batch = w.scheduler.handle_event(&event).await.unwrap().unwrap();
        w.report(&batch, "base", JobStatus::Succeeded).await;
        assert_eq!(w.status(&batch, "top"), JobStatus::Created);

        let handles: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|project| {
                let (w, batch) = (Arc::clone(&w), batch.clone());
                tokio::spawn(async move { w.report(&batch, project, JobStatus::Succeeded).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let tops = w.dispatcher.projects().into_iter().filter(|p| p == "top").count();
        assert_eq!(tops, 1);
        assert_eq!(w.status(&batch, "top"), JobStatus::Triggered);

        w.report(&batch, "top", JobStatus::Succeeded).await;
        assert_eq!(w.batch_status(&batch), BatchStatus::Succeeded);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failure_and_success_never_release_child() {
    for _ in 0..25 {
        let w = Arc::new(
            World::new(MemoryStore::new(), StaticImpactDetector::all(), Default::default())
                .with_config(DIAMOND_TOML),
        );
        let event = pr_event(BatchCommand::Plan, &[]);
        let batch = w.scheduler.handle_event(&event).await.unwrap().unwrap();
        w.report(&batch, "base", JobStatus::Succeeded).await;

        let handles: Vec<_> = [("left", JobStatus::Succeeded), ("right", JobStatus::Failed)]
            .into_iter()
            .map(|(project, status)| {
                let (w, batch) = (Arc::clone(&w), batch.clone());
                tokio::spawn(async move { w.report(&batch, project, status).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(w.status(&batch, "top"), JobStatus::Created);
        assert_eq!(w.batch_status(&batch), BatchStatus::Failed);
    }
}
