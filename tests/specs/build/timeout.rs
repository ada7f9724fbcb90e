//! Timeout specs

use crate::prelude::*;

#[tokio::test]
async fn timeout_interrupts_step_and_stops_chain() {
    let world = World::new();
    world.worker.script("slow", Script::hang());
    let plans = Plans::new();
    let slow = plans.timeout(Duration::from_millis(20), plans.task("slow"));

    let id = world.run(&plans.do_steps(vec![slow, plans.task("after")])).await;

    assert_eq!(world.worker.call_names(), vec!["slow"]);
    assert_eq!(world.trace(&id), vec!["initialize-task", "start-task", "error"]);
    assert_eq!(world.status(&id), BuildStatus::Errored);
}

#[tokio::test]
async fn timed_out_step_under_try_lets_chain_continue() {
    let world = World::new();
    world.worker.script("slow", Script::hang());
    let plans = Plans::new();
    let slow = plans.try_step(plans.timeout(Duration::from_millis(20), plans.task("slow")));

    let id = world.run(&plans.do_steps(vec![slow, plans.task("after")])).await;

    assert_eq!(world.worker.call_names(), vec!["slow", "after"]);
    assert_eq!(world.status(&id), BuildStatus::Succeeded);
}

#[tokio::test]
async fn fast_step_is_unaffected_by_timeout() {
    let world = World::new();
    let plans = Plans::new();

    let id = world.run(&plans.timeout(Duration::from_secs(5), plans.task("fast"))).await;

    assert_eq!(world.status(&id), BuildStatus::Succeeded);
}
