// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan to step-tree compilation.

use crate::delegate::DelegateFactory;
use crate::step::{
    Aggregate, Do, GetStep, Hook, HookKind, Identity, InParallel, PutStep, Retry, Step, TaskStep,
    Timeout, Try,
};
use kiln_adapters::{StepContext, Worker};
use kiln_core::{BuildId, Plan, PlanStep};
use std::sync::Arc;

/// Compiles plans into step trees for one build.
///
/// Every leaf gets its own delegate keyed by the leaf's plan id. Leaves
/// inside retries carry their attempt numbers so the worker can name
/// containers per attempt.
pub struct StepBuilder {
    build_id: BuildId,
    worker: Arc<dyn Worker>,
    delegates: Arc<dyn DelegateFactory>,
}

impl StepBuilder {
    pub fn new(build_id: BuildId, worker: Arc<dyn Worker>, delegates: Arc<dyn DelegateFactory>) -> Self {
        Self { build_id, worker, delegates }
    }

    pub fn build(&self, plan: &Plan) -> Box<dyn Step> {
        self.build_step(plan, &[])
    }

    fn build_step(&self, plan: &Plan, attempts: &[u32]) -> Box<dyn Step> {
        tracing::trace!(origin = %plan.id, kind = plan.step.kind(), "building step");
        match &plan.step {
            PlanStep::Aggregate(plans) => Box::new(Aggregate::new(self.build_all(plans, attempts))),
            PlanStep::InParallel { steps, limit, fail_fast } => {
                Box::new(InParallel::new(self.build_all(steps, attempts), *limit, *fail_fast))
            }
            PlanStep::Do(plans) => Box::new(Do::new(self.build_all(plans, attempts))),
            PlanStep::Timeout { duration, step } => {
                Box::new(Timeout::new(self.build_step(step, attempts), *duration))
            }
            PlanStep::Try { step } => Box::new(Try::new(self.build_step(step, attempts))),
            PlanStep::OnSuccess { step, next } => self.hook(HookKind::OnSuccess, step, next, attempts),
            PlanStep::OnFailure { step, next } => self.hook(HookKind::OnFailure, step, next, attempts),
            PlanStep::Ensure { step, next } => self.hook(HookKind::Ensure, step, next, attempts),
            PlanStep::OnAbort { step, next } => self.hook(HookKind::OnAbort, step, next, attempts),
            PlanStep::OnError { step, next } => self.hook(HookKind::OnError, step, next, attempts),
            PlanStep::Retry(plans) => {
                let steps = plans
                    .iter()
                    .zip(1u32..)
                    .map(|(p, attempt)| {
                        let mut nested = attempts.to_vec();
                        nested.push(attempt);
                        self.build_step(p, &nested)
                    })
                    .collect();
                Box::new(Retry::new(steps))
            }
            PlanStep::Task(task) => Box::new(TaskStep::new(
                task.clone(),
                self.context(plan, &task.name, attempts),
                Arc::clone(&self.worker),
                self.delegates.task(&plan.id),
            )),
            PlanStep::Get(get) => Box::new(GetStep::new(
                get.clone(),
                self.context(plan, &get.name, attempts),
                Arc::clone(&self.worker),
                self.delegates.get(&plan.id),
            )),
            PlanStep::DependentGet(get) => Box::new(GetStep::dependent(
                get.clone(),
                self.context(plan, &get.name, attempts),
                Arc::clone(&self.worker),
                self.delegates.get(&plan.id),
            )),
            PlanStep::Put(put) => Box::new(PutStep::new(
                put.clone(),
                self.context(plan, &put.name, attempts),
                Arc::clone(&self.worker),
                self.delegates.put(&plan.id),
            )),
            PlanStep::Identity => Box::new(Identity),
        }
    }

    fn build_all(&self, plans: &[Plan], attempts: &[u32]) -> Vec<Box<dyn Step>> {
        plans.iter().map(|p| self.build_step(p, attempts)).collect()
    }

    fn hook(&self, kind: HookKind, step: &Plan, next: &Plan, attempts: &[u32]) -> Box<dyn Step> {
        Box::new(Hook::new(kind, self.build_step(step, attempts), self.build_step(next, attempts)))
    }

    fn context(&self, plan: &Plan, name: &str, attempts: &[u32]) -> StepContext {
        StepContext::new(self.build_id.clone(), plan.id.clone(), name).with_attempts(attempts.to_vec())
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
