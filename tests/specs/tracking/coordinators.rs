//! Multi-coordinator specs
//!
//! Verify the tracking lease lets exactly one coordinator drive a build.

use crate::prelude::*;

#[tokio::test]
async fn concurrent_resumes_call_through_once() {
    let world = World::new();
    world.worker.script("unit", Script::exit(0).with_delay(Duration::from_millis(30)));
    let a = world.coordinator("a");
    let b = world.coordinator("b");
    let plans = Plans::new();
    let (id, from_a) = world.submit(&a, &plans.task("unit")).await;
    let from_b = world.handle(&b, &id).await;

    tokio::time::timeout(SPEC_WAIT_MAX, async { tokio::join!(from_a.resume(), from_b.resume()) })
        .await
        .unwrap();

    assert_eq!(world.worker.call_names(), vec!["unit"]);
    let started = world.metrics.calls().iter().filter(|c| matches!(c, MetricsCall::Started(_))).count();
    assert_eq!(started, 1);
    assert_eq!(world.status(&id), BuildStatus::Succeeded);
    let tracker = world.store.snapshot(&id).unwrap().tracked_by.unwrap();
    assert!(tracker == "a" || tracker == "b", "unexpected tracker {tracker}");
}

#[tokio::test]
async fn resume_after_finish_does_nothing() {
    let world = World::new();
    let plans = Plans::new();
    let id = world.run(&plans.task("unit")).await;
    let other = world.coordinator("other");

    world.handle(&other, &id).await.resume().await;

    assert_eq!(world.worker.call_names(), vec!["unit"]);
    assert_eq!(world.statuses(&id), vec![BuildStatus::Started, BuildStatus::Succeeded]);
}

#[tokio::test]
async fn abort_from_other_coordinator_reaches_tracker() {
    let world = World::new();
    world.worker.script("slow", Script::hang());
    let a = world.coordinator("a");
    let b = world.coordinator("b");
    let plans = Plans::new();
    let (id, build) = world.submit(&a, &plans.task("slow")).await;

    let running = tokio::spawn({
        let build = Arc::clone(&build);
        async move { build.resume().await }
    });
    world.worker.started("slow").await;
    world.handle(&b, &id).await.abort().await.unwrap();
    tokio::time::timeout(SPEC_WAIT_MAX, running).await.unwrap().unwrap();

    assert_eq!(world.status(&id), BuildStatus::Aborted);
    assert_eq!(
        world.metrics.calls(),
        vec![MetricsCall::Started(id.clone()), MetricsCall::Finished(id.clone(), BuildStatus::Aborted)]
    );
}

#[tokio::test]
async fn expired_lease_can_be_claimed_by_another_coordinator() {
    let world = World::new();
    let build = world.store.create_build(None).unwrap();
    let id = build.id().clone();

    let held = build.acquire_tracking_lock(Duration::from_secs(60)).await.unwrap();
    assert!(held.is_some());
    let other = world.store.build(&id).unwrap();
    assert!(other.acquire_tracking_lock(Duration::from_secs(60)).await.unwrap().is_none());

    world.clock.advance(Duration::from_secs(61));

    assert!(other.acquire_tracking_lock(Duration::from_secs(60)).await.unwrap().is_some());
}
