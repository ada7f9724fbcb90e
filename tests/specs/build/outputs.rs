//! Build output specs
//!
//! Verify which resource versions a build records as inputs and outputs.

use crate::prelude::*;

fn output_resources(world: &World, id: &BuildId) -> Vec<(String, bool)> {
    world.store.outputs(id).into_iter().map(|o| (o.resource.resource, o.explicit)).collect()
}

#[tokio::test]
async fn fetched_resource_becomes_implicit_output() {
    let world = World::new();
    let plans = Plans::new();

    let id = world.run(&plans.do_steps(vec![plans.get("repo"), plans.task("unit")])).await;

    assert_eq!(world.store.inputs(&id).len(), 1);
    assert_eq!(output_resources(&world, &id), vec![("repo".to_string(), false)]);
}

#[tokio::test]
async fn put_suppresses_implicit_output() {
    let world = World::new();
    world.worker.script("repo", Script::exit(0).with_version(kiln_core::version([("ref", "v2")])));
    let plans = Plans::new();

    let id = world.run(&plans.do_steps(vec![plans.get("repo"), plans.put("repo")])).await;

    let outputs = world.store.outputs(&id);
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].explicit);
    assert_eq!(outputs[0].resource.version, kiln_core::version([("ref", "v2")]));
}

#[tokio::test]
async fn dependent_get_after_put_is_not_implicit() {
    let world = World::new();
    let plans = Plans::new();

    let id = world.run(&plans.do_steps(vec![plans.put("repo"), plans.dependent_get("repo")])).await;

    assert_eq!(world.store.inputs(&id).len(), 1);
    assert_eq!(output_resources(&world, &id), vec![("repo".to_string(), true)]);
}

#[tokio::test]
async fn failed_build_keeps_inputs_but_no_implicit_outputs() {
    let world = World::new();
    world.worker.script("unit", Script::exit(1));
    let plans = Plans::new();

    let id = world.run(&plans.do_steps(vec![plans.get("repo"), plans.task("unit")])).await;

    assert_eq!(world.status(&id), BuildStatus::Failed);
    assert_eq!(world.store.inputs(&id).len(), 1);
    assert!(world.store.outputs(&id).is_empty());
}
