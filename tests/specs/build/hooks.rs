//! Hook combinator specs
//!
//! Verify which hooks run and what status the build ends with.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn on_success_runs_task_after_successful_get() {
    let world = World::new();
    let plans = Plans::new();

    let id = world.run(&plans.on_success(plans.get("r"), plans.task("t"))).await;

    assert_eq!(
        world.trace(&id),
        vec!["initialize-get", "finish-get", "initialize-task", "start-task", "finish-task"]
    );
    assert_eq!(world.status(&id), BuildStatus::Succeeded);
}

#[tokio::test]
async fn on_success_skips_task_after_failed_get() {
    let world = World::new();
    world.worker.script("r", Script::exit(1));
    let plans = Plans::new();

    let id = world.run(&plans.on_success(plans.get("r"), plans.task("t"))).await;

    assert_eq!(world.worker.call_names(), vec!["r"]);
    assert_eq!(world.status(&id), BuildStatus::Failed);
}

#[tokio::test]
async fn on_failure_hook_runs_and_build_still_fails() {
    let world = World::new();
    world.worker.script("r", Script::exit(1));
    let plans = Plans::new();

    let id = world.run(&plans.on_failure(plans.get("r"), plans.task("t"))).await;

    assert_eq!(world.worker.call_names(), vec!["r", "t"]);
    assert_eq!(world.status(&id), BuildStatus::Failed);
}

#[tokio::test]
async fn on_failure_hook_skipped_after_success() {
    let world = World::new();
    let plans = Plans::new();

    let id = world.run(&plans.on_failure(plans.get("r"), plans.task("t"))).await;

    assert_eq!(world.worker.call_names(), vec!["r"]);
    assert_eq!(world.status(&id), BuildStatus::Succeeded);
}

#[tokio::test]
async fn try_turns_erroring_get_into_success() {
    let world = World::new();
    world.worker.script("r", Script::error("no workers"));
    let plans = Plans::new();

    let id = world.run(&plans.on_success(plans.try_step(plans.get("r")), plans.task("t"))).await;

    assert_eq!(world.worker.call_names(), vec!["r", "t"]);
    assert_eq!(world.status(&id), BuildStatus::Succeeded);
    assert_eq!(world.trace(&id), vec![
        "initialize-get",
        "error",
        "initialize-task",
        "start-task",
        "finish-task"
    ]);
}

#[tokio::test]
async fn ensure_runs_after_error_and_build_errors() {
    let world = World::new();
    world.worker.script("a", Script::error("no workers"));
    let plans = Plans::new();

    let id = world.run(&plans.ensure(plans.task("a"), plans.task("cleanup"))).await;

    assert_eq!(world.worker.call_names(), vec!["a", "cleanup"]);
    assert_eq!(world.status(&id), BuildStatus::Errored);
}

#[tokio::test]
async fn do_continues_past_failed_child() {
    let world = World::new();
    world.worker.script("a", Script::exit(1));
    let plans = Plans::new();

    let id = world.run(&plans.do_steps(vec![plans.task("a"), plans.task("b")])).await;

    assert_eq!(world.worker.call_names(), vec!["a", "b"]);
    assert_eq!(world.status(&id), BuildStatus::Failed);
}

#[tokio::test]
async fn aggregate_failure_does_not_cancel_siblings() {
    let world = World::new();
    world.worker.script("a", Script::exit(1));
    world.worker.script("b", Script::exit(0).with_delay(Duration::from_millis(20)));
    let plans = Plans::new();

    let id = world.run(&plans.aggregate(vec![plans.task("a"), plans.task("b")])).await;

    let finished: Vec<i32> = world
        .store
        .decoded_events(&id)
        .into_iter()
        .filter_map(|e| match e {
            Event::FinishTask { exit_status, .. } => Some(exit_status),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![1, 0]);
    assert_eq!(world.status(&id), BuildStatus::Failed);
}

#[tokio::test]
async fn status_is_written_once_per_transition() {
    let world = World::new();
    let plans = Plans::new();

    let id = world.run(&plans.task("t")).await;

    assert_eq!(world.statuses(&id), vec![BuildStatus::Started, BuildStatus::Succeeded]);
}
