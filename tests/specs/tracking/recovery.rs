//! Recovery specs
//!
//! Verify builds survive coordinator release and store restarts.

use crate::prelude::*;

#[tokio::test]
async fn released_build_is_resumed_elsewhere() {
    let world = World::new();
    world.worker.script("slow", Script::hang());
    let a = world.coordinator("a");
    let plans = Plans::new();
    let (id, build) = world.submit(&a, &plans.task("slow")).await;

    let running = tokio::spawn({
        let build = Arc::clone(&build);
        async move { build.resume().await }
    });
    world.worker.started("slow").await;
    tokio::time::timeout(SPEC_WAIT_MAX, a.release_all()).await.unwrap();
    running.await.unwrap();
    assert_eq!(world.status(&id), BuildStatus::Started);

    world.worker.script("slow", Script::exit(0));
    let b = world.coordinator("b");
    world.handle(&b, &id).await.resume().await;

    assert_eq!(world.status(&id), BuildStatus::Succeeded);
    assert_eq!(world.worker.call_names(), vec!["slow", "slow"]);
    assert_eq!(world.store.snapshot(&id).unwrap().tracked_by.as_deref(), Some("b"));
}

#[tokio::test]
async fn started_build_resumes_after_store_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("builds.wal");
    let plans = Plans::new();
    let plan = plans.on_success(plans.get("repo"), plans.task("unit"));

    let id = {
        let world = World::with_store(BuildStore::open(&path, FakeClock::new()).unwrap());
        let coordinator = world.coordinator("a");
        let (id, _) = world.submit(&coordinator, &plan).await;
        id
    };

    let world = World::with_store(BuildStore::open(&path, FakeClock::new()).unwrap());
    assert_eq!(world.status(&id), BuildStatus::Started);
    let coordinator = world.coordinator("b");
    world.handle(&coordinator, &id).await.resume().await;

    assert_eq!(world.worker.call_names(), vec!["repo", "unit"]);
    assert_eq!(world.status(&id), BuildStatus::Succeeded);
    let persisted: serde_json::Value =
        serde_json::from_str(&world.store.snapshot(&id).unwrap().engine_metadata).unwrap();
    assert!(persisted.get("plan").is_some());
}

#[tokio::test]
async fn unknown_engine_errors_the_build() {
    let world = World::new();
    let build = world.store.create_build(None).unwrap();
    let id = build.id().clone();
    let plans = Plans::new();
    assert!(build.start("exec.v0", "{}", &plans.task("unit")).await.unwrap());

    let coordinator = world.coordinator("a");
    world.handle(&coordinator, &id).await.resume().await;

    assert_eq!(world.status(&id), BuildStatus::Errored);
    assert!(world.worker.calls().is_empty());
    let errors: Vec<String> = world
        .store
        .decoded_events(&id)
        .into_iter()
        .filter_map(|e| match e {
            Event::Error { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["unknown build engine: exec.v0"]);
}
