//! Abort specs
//!
//! Verify aborts interrupt running trees and win over every other outcome.

use crate::prelude::*;

#[tokio::test]
async fn abort_interrupts_running_build() {
    let world = World::new();
    world.worker.script("slow", Script::hang());
    let coordinator = world.coordinator("local");
    let plans = Plans::new();
    let (id, build) = world.submit(&coordinator, &plans.do_steps(vec![plans.task("slow"), plans.task("after")])).await;

    let running = tokio::spawn({
        let build = Arc::clone(&build);
        async move { build.resume().await }
    });
    world.worker.started("slow").await;
    build.abort().await.unwrap();
    tokio::time::timeout(SPEC_WAIT_MAX, running).await.unwrap().unwrap();

    assert_eq!(world.status(&id), BuildStatus::Aborted);
    assert_eq!(world.statuses(&id), vec![BuildStatus::Started, BuildStatus::Aborted]);
    assert_eq!(world.worker.call_names(), vec!["slow"]);
}

#[tokio::test]
async fn abort_wins_over_errors_it_causes() {
    let world = World::new();
    world.worker.script("slow", Script::hang());
    world.worker.script("cleanup", Script::error("no workers"));
    let coordinator = world.coordinator("local");
    let plans = Plans::new();
    let (id, build) = world.submit(&coordinator, &plans.ensure(plans.task("slow"), plans.task("cleanup"))).await;

    let running = tokio::spawn({
        let build = Arc::clone(&build);
        async move { build.resume().await }
    });
    world.worker.started("slow").await;
    build.abort().await.unwrap();
    tokio::time::timeout(SPEC_WAIT_MAX, running).await.unwrap().unwrap();

    assert_eq!(world.status(&id), BuildStatus::Aborted);
}

#[tokio::test]
async fn pending_build_aborts_without_running() {
    let world = World::new();
    let coordinator = world.coordinator("local");
    let build = world.store.create_build(None).unwrap();
    let id = build.id().clone();

    let handle = coordinator.lookup_build(Arc::new(build)).await.unwrap();
    handle.abort().await.unwrap();
    assert_eq!(world.status(&id), BuildStatus::Aborted);

    let plans = Plans::new();
    let late = coordinator.create_build(Arc::new(world.store.build(&id).unwrap()), &plans.task("t")).await.unwrap();
    late.resume().await;

    assert!(world.worker.calls().is_empty());
    assert_eq!(world.statuses(&id), vec![BuildStatus::Aborted]);
}

#[tokio::test]
async fn abort_hook_runs_before_build_finishes() {
    let world = World::new();
    world.worker.script("slow", Script::hang());
    let coordinator = world.coordinator("local");
    let plans = Plans::new();
    let plan = plans.on_abort(plans.task("slow"), plans.task("cleanup"));
    let (id, build) = world.submit(&coordinator, &plan).await;

    let running = tokio::spawn({
        let build = Arc::clone(&build);
        async move { build.resume().await }
    });
    world.worker.started("slow").await;
    build.abort().await.unwrap();
    tokio::time::timeout(SPEC_WAIT_MAX, running).await.unwrap().unwrap();

    assert_eq!(world.worker.call_names(), vec!["slow", "cleanup"]);
    assert_eq!(world.status(&id), BuildStatus::Aborted);
}

#[tokio::test]
async fn finished_build_ignores_abort() {
    let world = World::new();
    let plans = Plans::new();
    let id = world.run(&plans.task("t")).await;
    let coordinator = world.coordinator("local");

    world.handle(&coordinator, &id).await.abort().await.unwrap();

    assert_eq!(world.status(&id), BuildStatus::Succeeded);
    assert!(world.store.snapshot(&id).unwrap().aborted);
}
