// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build plans.
//!
//! A [`Plan`] is the immutable, already-evaluated description of what one
//! build runs. Every node carries a stable [`PlanId`] that becomes the
//! origin of every event the node emits. Plans are serialized into the
//! build's engine metadata so a replacement tracker resumes the exact same
//! tree.

use crate::id::PlanId;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Opaque resource/task configuration passed through to the worker.
pub type Params = BTreeMap<String, serde_json::Value>;

/// One node of a build plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub step: PlanStep,
}

/// The shape of a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum PlanStep {
    /// Run every child concurrently
    Aggregate(Vec<Plan>),
    /// Run children concurrently, at most `limit` at a time (0 = unbounded)
    InParallel {
        steps: Vec<Plan>,
        #[serde(default, skip_serializing_if = "is_zero")]
        limit: usize,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        fail_fast: bool,
    },
    /// Run children in order
    Do(Vec<Plan>),
    Timeout {
        #[serde(with = "duration_ms")]
        duration: Duration,
        step: Box<Plan>,
    },
    Try { step: Box<Plan> },
    OnSuccess { step: Box<Plan>, next: Box<Plan> },
    OnFailure { step: Box<Plan>, next: Box<Plan> },
    Ensure { step: Box<Plan>, next: Box<Plan> },
    OnAbort { step: Box<Plan>, next: Box<Plan> },
    OnError { step: Box<Plan>, next: Box<Plan> },
    Task(TaskPlan),
    Get(GetPlan),
    Put(PutPlan),
    /// A get whose version comes from the preceding put of the same resource
    DependentGet(DependentGetPlan),
    /// One child per attempt
    Retry(Vec<Plan>),
    /// No-op
    Identity,
}

impl PlanStep {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanStep::Aggregate(_) => "aggregate",
            PlanStep::InParallel { .. } => "in_parallel",
            PlanStep::Do(_) => "do",
            PlanStep::Timeout { .. } => "timeout",
            PlanStep::Try { .. } => "try",
            PlanStep::OnSuccess { .. } => "on_success",
            PlanStep::OnFailure { .. } => "on_failure",
            PlanStep::Ensure { .. } => "ensure",
            PlanStep::OnAbort { .. } => "on_abort",
            PlanStep::OnError { .. } => "on_error",
            PlanStep::Task(_) => "task",
            PlanStep::Get(_) => "get",
            PlanStep::Put(_) => "put",
            PlanStep::DependentGet(_) => "dependent_get",
            PlanStep::Retry(_) => "retry",
            PlanStep::Identity => "identity",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
    pub config: TaskConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub image: String,
    pub run: TaskRunConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunConfig {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetPlan {
    pub name: String,
    pub resource: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub source: Params,
    #[serde(default)]
    pub params: Params,
    /// Pinned version; `None` fetches whatever the worker resolves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutPlan {
    pub name: String,
    pub resource: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub source: Params,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependentGetPlan {
    pub name: String,
    pub resource: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub source: Params,
    #[serde(default)]
    pub params: Params,
}

impl DependentGetPlan {
    /// The get plan this resolves to once the put's version is known.
    pub fn resolve(&self, version: Version) -> GetPlan {
        GetPlan {
            name: self.name.clone(),
            resource: self.resource.clone(),
            resource_type: self.resource_type.clone(),
            source: self.source.clone(),
            params: self.params.clone(),
            version: Some(version),
        }
    }
}

impl From<TaskPlan> for PlanStep {
    fn from(plan: TaskPlan) -> Self {
        PlanStep::Task(plan)
    }
}

impl From<GetPlan> for PlanStep {
    fn from(plan: GetPlan) -> Self {
        PlanStep::Get(plan)
    }
}

impl From<PutPlan> for PlanStep {
    fn from(plan: PutPlan) -> Self {
        PlanStep::Put(plan)
    }
}

impl From<DependentGetPlan> for PlanStep {
    fn from(plan: DependentGetPlan) -> Self {
        PlanStep::DependentGet(plan)
    }
}

/// Hands out plan nodes with unique, sequential ids.
///
/// Ids are lowercase hex counting up from the seed, so two factories with
/// different seeds never collide within one build.
#[derive(Debug)]
pub struct PlanFactory {
    next: AtomicU64,
}

impl PlanFactory {
    pub fn new(seed: u64) -> Self {
        Self { next: AtomicU64::new(seed) }
    }

    pub fn new_plan(&self, step: impl Into<PlanStep>) -> Plan {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Plan { id: PlanId::from_string(format!("{n:x}")), step: step.into() }
    }

    pub fn aggregate(&self, plans: Vec<Plan>) -> Plan {
        self.new_plan(PlanStep::Aggregate(plans))
    }

    pub fn in_parallel(&self, steps: Vec<Plan>, limit: usize, fail_fast: bool) -> Plan {
        self.new_plan(PlanStep::InParallel { steps, limit, fail_fast })
    }

    pub fn do_steps(&self, plans: Vec<Plan>) -> Plan {
        self.new_plan(PlanStep::Do(plans))
    }

    pub fn timeout(&self, duration: Duration, step: Plan) -> Plan {
        self.new_plan(PlanStep::Timeout { duration, step: Box::new(step) })
    }

    pub fn try_step(&self, step: Plan) -> Plan {
        self.new_plan(PlanStep::Try { step: Box::new(step) })
    }

    pub fn on_success(&self, step: Plan, next: Plan) -> Plan {
        self.new_plan(PlanStep::OnSuccess { step: Box::new(step), next: Box::new(next) })
    }

    pub fn on_failure(&self, step: Plan, next: Plan) -> Plan {
        self.new_plan(PlanStep::OnFailure { step: Box::new(step), next: Box::new(next) })
    }

    pub fn ensure(&self, step: Plan, next: Plan) -> Plan {
        self.new_plan(PlanStep::Ensure { step: Box::new(step), next: Box::new(next) })
    }

    pub fn on_abort(&self, step: Plan, next: Plan) -> Plan {
        self.new_plan(PlanStep::OnAbort { step: Box::new(step), next: Box::new(next) })
    }

    pub fn on_error(&self, step: Plan, next: Plan) -> Plan {
        self.new_plan(PlanStep::OnError { step: Box::new(step), next: Box::new(next) })
    }

    pub fn retry(&self, attempts: Vec<Plan>) -> Plan {
        self.new_plan(PlanStep::Retry(attempts))
    }
}

impl Default for PlanFactory {
    fn default() -> Self {
        Self::new(1)
    }
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
