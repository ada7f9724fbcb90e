// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{RunState, Step};
use crate::delegate::GetDelegate;
use crate::error::StepError;
use async_trait::async_trait;
use kiln_adapters::{ResourceResult, StepContext, Worker};
use kiln_core::{DependentGetPlan, GetPlan};
use std::sync::Arc;

enum Source {
    Pinned(GetPlan),
    Dependent(DependentGetPlan),
}

/// Fetches a resource version.
///
/// A dependent get has no version of its own; it fetches whatever the most
/// recent successful put of the same resource produced in this run.
pub struct GetStep {
    source: Source,
    ctx: StepContext,
    worker: Arc<dyn Worker>,
    delegate: Box<dyn GetDelegate>,
    result: Option<ResourceResult>,
}

impl GetStep {
    pub fn new(plan: GetPlan, ctx: StepContext, worker: Arc<dyn Worker>, delegate: Box<dyn GetDelegate>) -> Self {
        Self { source: Source::Pinned(plan), ctx, worker, delegate, result: None }
    }

    pub fn dependent(
        plan: DependentGetPlan,
        ctx: StepContext,
        worker: Arc<dyn Worker>,
        delegate: Box<dyn GetDelegate>,
    ) -> Self {
        Self { source: Source::Dependent(plan), ctx, worker, delegate, result: None }
    }

    async fn fetch(&self, plan: &GetPlan, state: &RunState) -> Result<ResourceResult, StepError> {
        let io = self.delegate.io();
        let cancel = state.token().clone();
        tokio::select! {
            biased;
            _ = state.cancelled() => Err(StepError::Interrupted),
            result = self.worker.fetch(&self.ctx, plan, io, cancel) => result.map_err(StepError::from),
        }
    }
}

#[async_trait]
impl Step for GetStep {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        state.check()?;
        self.delegate.initializing().await;

        let plan = match &self.source {
            Source::Pinned(plan) => plan.clone(),
            Source::Dependent(plan) => match state.put_result(&plan.resource) {
                Some(info) => plan.resolve(info.version),
                None => {
                    let err = StepError::MissingVersion(plan.resource.clone());
                    self.delegate.failed(&err).await;
                    return Err(err);
                }
            },
        };

        match self.fetch(&plan, state).await {
            Ok(result) => {
                self.delegate.completed(&plan, &result).await;
                self.result = Some(result);
                Ok(())
            }
            Err(e) => {
                self.delegate.failed(&e).await;
                Err(e)
            }
        }
    }

    fn succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(ResourceResult::succeeded)
    }
}
