// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_adapters::{FakeWorker, Script};
use kiln_core::test_support::Plans;
use kiln_core::{BuildStatus, Event, FakeClock};
use kiln_storage::FakeBuildDb;
use std::time::Duration;

struct Harness {
    db: FakeBuildDb,
    worker: FakeWorker,
    engine: ExecEngine<FakeClock>,
}

impl Harness {
    fn new() -> Self {
        let worker = FakeWorker::new();
        let engine = ExecEngine::with_clock(Arc::new(worker.clone()), FakeClock::new());
        Self { db: FakeBuildDb::new(), worker, engine }
    }

    async fn create(&self, plan: &Plan) -> Arc<dyn EngineBuild> {
        self.engine.create_build(Arc::new(self.db.clone()), plan).await.unwrap()
    }

    fn spawn_resume(build: &Arc<dyn EngineBuild>) -> tokio::task::JoinHandle<()> {
        let build = Arc::clone(build);
        tokio::spawn(async move { build.resume().await })
    }
}

#[tokio::test]
async fn successful_tree_finishes_succeeded() {
    let h = Harness::new();
    let plans = Plans::new();
    let build = h.create(&plans.do_steps(vec![plans.get("repo"), plans.task("unit")])).await;

    build.resume().await;

    assert_eq!(h.db.finishes(), vec![BuildStatus::Succeeded]);
    assert_eq!(h.worker.call_names(), vec!["repo", "unit"]);
}

#[tokio::test]
async fn failing_task_finishes_failed() {
    let h = Harness::new();
    h.worker.script("unit", Script::exit(1));
    let plans = Plans::new();
    let build = h.create(&plans.task("unit")).await;

    build.resume().await;

    assert_eq!(h.db.finishes(), vec![BuildStatus::Failed]);
}

#[tokio::test]
async fn worker_error_finishes_errored() {
    let h = Harness::new();
    h.worker.script("unit", Script::error("no workers"));
    let plans = Plans::new();
    let build = h.create(&plans.task("unit")).await;

    build.resume().await;

    assert_eq!(h.db.finishes(), vec![BuildStatus::Errored]);
}

#[tokio::test]
async fn implicit_outputs_saved_when_build_succeeds() {
    let h = Harness::new();
    let plans = Plans::new();
    let build = h.create(&plans.get("repo")).await;

    build.resume().await;

    let outputs = h.db.outputs();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0.resource, "repo");
    assert!(!outputs[0].1);
}

#[tokio::test]
async fn abort_interrupts_and_finishes_aborted() {
    let h = Harness::new();
    h.worker.script("slow", Script::hang());
    let plans = Plans::new();
    let build = h.create(&plans.do_steps(vec![plans.task("slow"), plans.task("after")])).await;

    let running = Harness::spawn_resume(&build);
    h.worker.started("slow").await;
    build.abort().await.unwrap();
    build.abort().await.unwrap();
    running.await.unwrap();

    assert_eq!(h.db.finishes(), vec![BuildStatus::Aborted]);
    assert_eq!(h.worker.call_names(), vec!["slow"]);
}

#[tokio::test]
async fn abort_before_resume_is_honored() {
    let h = Harness::new();
    h.worker.script("slow", Script::hang());
    let plans = Plans::new();
    let build = h.create(&plans.task("slow")).await;

    build.abort().await.unwrap();
    build.resume().await;

    assert_eq!(h.db.finishes(), vec![BuildStatus::Aborted]);
}

#[tokio::test]
async fn aborted_build_does_not_promote_implicit_outputs() {
    let h = Harness::new();
    h.worker.script("slow", Script::hang());
    let plans = Plans::new();
    let build = h.create(&plans.do_steps(vec![plans.get("repo"), plans.task("slow")])).await;

    let running = Harness::spawn_resume(&build);
    h.worker.started("slow").await;
    build.abort().await.unwrap();
    running.await.unwrap();

    assert!(h.db.outputs().is_empty());
}

#[tokio::test]
async fn release_stops_without_finishing() {
    let h = Harness::new();
    h.worker.script("slow", Script::hang());
    let plans = Plans::new();
    let build = h.create(&plans.task("slow")).await;

    let running = Harness::spawn_resume(&build);
    h.worker.started("slow").await;
    h.engine.release_all().await;
    tokio::time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap();

    assert!(h.db.finishes().is_empty());
}

#[tokio::test]
async fn second_resume_is_a_no_op() {
    let h = Harness::new();
    let plans = Plans::new();
    let build = h.create(&plans.task("unit")).await;

    build.resume().await;
    build.resume().await;

    assert_eq!(h.db.finishes().len(), 1);
    assert_eq!(h.worker.call_names(), vec!["unit"]);
}

#[tokio::test]
async fn lookup_rebuilds_the_same_tree() {
    let h = Harness::new();
    let plans = Plans::new();
    let plan = plans.on_success(plans.task("a"), plans.task("b"));
    let created = h.create(&plan).await;
    let metadata = created.metadata();

    let db = FakeBuildDb::started(EXEC_ENGINE_NAME, &metadata);
    let found = h.engine.lookup_build(Arc::new(db.clone())).await.unwrap();
    found.resume().await;

    assert_eq!(found.metadata(), metadata);
    assert_eq!(h.worker.call_names(), vec!["a", "b"]);
    assert_eq!(db.finishes(), vec![BuildStatus::Succeeded]);
    let decoded: ExecMetadata = serde_json::from_str(&metadata).unwrap();
    assert_eq!(decoded.plan, plan);
}

#[tokio::test]
async fn lookup_rejects_garbage_metadata() {
    let h = Harness::new();
    let db = FakeBuildDb::started(EXEC_ENGINE_NAME, "not json");

    let result = h.engine.lookup_build(Arc::new(db)).await;

    assert!(matches!(result, Err(EngineError::Metadata(_))));
}

#[tokio::test]
async fn every_event_of_a_finished_build_precedes_its_finish() {
    let h = Harness::new();
    let plans = Plans::new();
    let build = h.create(&plans.aggregate(vec![plans.task("a"), plans.get("b")])).await;

    build.resume().await;

    let calls = h.db.calls();
    let finish = calls.iter().position(|c| matches!(c, kiln_storage::DbCall::Finish(_))).unwrap();
    assert!(calls[finish..].iter().all(|c| !matches!(c, kiln_storage::DbCall::SaveEvent(Event::FinishTask { .. }))));
}
