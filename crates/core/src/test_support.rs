// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::plan::{
    DependentGetPlan, GetPlan, PlanFactory, PlanStep, PutPlan, TaskConfig, TaskPlan, TaskRunConfig,
};
use crate::Plan;

// ── Plan leaf factories ─────────────────────────────────────────────────

pub fn task_plan(name: &str) -> TaskPlan {
    TaskPlan {
        name: name.to_string(),
        privileged: false,
        config: TaskConfig {
            image: "busybox".to_string(),
            run: TaskRunConfig { path: "sh".to_string(), args: vec!["-c".to_string(), "true".to_string()] },
            params: Default::default(),
        },
    }
}

/// A get where step name and resource name coincide.
pub fn get_plan(resource: &str) -> GetPlan {
    GetPlan {
        name: resource.to_string(),
        resource: resource.to_string(),
        resource_type: "git".to_string(),
        ..GetPlan::default()
    }
}

pub fn put_plan(resource: &str) -> PutPlan {
    PutPlan {
        name: resource.to_string(),
        resource: resource.to_string(),
        resource_type: "git".to_string(),
        ..PutPlan::default()
    }
}

pub fn dependent_get_plan(resource: &str) -> DependentGetPlan {
    DependentGetPlan {
        name: resource.to_string(),
        resource: resource.to_string(),
        resource_type: "git".to_string(),
        ..DependentGetPlan::default()
    }
}

/// Plan-tree shorthand over a [`PlanFactory`].
pub struct Plans {
    factory: PlanFactory,
}

impl Plans {
    pub fn new() -> Self {
        Self { factory: PlanFactory::new(1) }
    }

    pub fn task(&self, name: &str) -> Plan {
        self.factory.new_plan(task_plan(name))
    }

    pub fn get(&self, resource: &str) -> Plan {
        self.factory.new_plan(get_plan(resource))
    }

    pub fn put(&self, resource: &str) -> Plan {
        self.factory.new_plan(put_plan(resource))
    }

    pub fn dependent_get(&self, resource: &str) -> Plan {
        self.factory.new_plan(dependent_get_plan(resource))
    }

    pub fn identity(&self) -> Plan {
        self.factory.new_plan(PlanStep::Identity)
    }
}

impl Default for Plans {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for Plans {
    type Target = PlanFactory;

    fn deref(&self) -> &PlanFactory {
        &self.factory
    }
}

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for plan trees.
pub mod strategies {
    use crate::plan::{Plan, PlanStep};
    use crate::PlanId;
    use proptest::prelude::*;

    fn leaf() -> impl Strategy<Value = PlanStep> {
        prop_oneof![
            "[a-c]".prop_map(|n| PlanStep::Task(super::task_plan(&n))),
            "[a-c]".prop_map(|n| PlanStep::Get(super::get_plan(&n))),
            "[a-c]".prop_map(|n| PlanStep::Put(super::put_plan(&n))),
            Just(PlanStep::Identity),
        ]
    }

    /// Arbitrary plan trees of bounded depth. Ids are unique within a tree.
    pub fn arb_plan() -> impl Strategy<Value = Plan> {
        let tree = leaf().prop_recursive(3, 16, 3, |inner| {
            let node = inner.prop_map(|step| Plan { id: PlanId::from_string(""), step });
            prop_oneof![
                prop::collection::vec(node.clone(), 0..3).prop_map(PlanStep::Aggregate),
                prop::collection::vec(node.clone(), 0..3).prop_map(PlanStep::Do),
                (prop::collection::vec(node.clone(), 0..3), 0..3usize, any::<bool>())
                    .prop_map(|(steps, limit, fail_fast)| PlanStep::InParallel { steps, limit, fail_fast }),
                node.clone().prop_map(|p| PlanStep::Try { step: Box::new(p) }),
                (node.clone(), node.clone())
                    .prop_map(|(s, n)| PlanStep::OnSuccess { step: Box::new(s), next: Box::new(n) }),
                (node.clone(), node.clone())
                    .prop_map(|(s, n)| PlanStep::Ensure { step: Box::new(s), next: Box::new(n) }),
                (node.clone(), node)
                    .prop_map(|(s, n)| PlanStep::OnError { step: Box::new(s), next: Box::new(n) }),
            ]
        });
        tree.prop_map(|step| {
            let mut plan = Plan { id: PlanId::from_string(""), step };
            renumber(&mut plan, &mut 0);
            plan
        })
    }

    fn renumber(plan: &mut Plan, next: &mut u64) {
        *next += 1;
        plan.id = PlanId::from_string(format!("{next:x}"));
        match &mut plan.step {
            PlanStep::Aggregate(children)
            | PlanStep::Do(children)
            | PlanStep::Retry(children)
            | PlanStep::InParallel { steps: children, .. } => {
                for child in children {
                    renumber(child, next);
                }
            }
            PlanStep::Timeout { step, .. } | PlanStep::Try { step } => renumber(step, next),
            PlanStep::OnSuccess { step, next: hook }
            | PlanStep::OnFailure { step, next: hook }
            | PlanStep::Ensure { step, next: hook }
            | PlanStep::OnAbort { step, next: hook }
            | PlanStep::OnError { step, next: hook } => {
                renumber(step, next);
                renumber(hook, next);
            }
            _ => {}
        }
    }
}
