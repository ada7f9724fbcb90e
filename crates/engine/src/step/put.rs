// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{RunState, Step};
use crate::delegate::PutDelegate;
use crate::error::StepError;
use async_trait::async_trait;
use kiln_adapters::{ResourceResult, StepContext, Worker};
use kiln_core::PutPlan;
use std::sync::Arc;

/// Pushes a new resource version.
///
/// A successful put records its version in the [`RunState`] for dependent
/// gets of the same resource.
pub struct PutStep {
    plan: PutPlan,
    ctx: StepContext,
    worker: Arc<dyn Worker>,
    delegate: Box<dyn PutDelegate>,
    result: Option<ResourceResult>,
}

impl PutStep {
    pub fn new(plan: PutPlan, ctx: StepContext, worker: Arc<dyn Worker>, delegate: Box<dyn PutDelegate>) -> Self {
        Self { plan, ctx, worker, delegate, result: None }
    }
}

#[async_trait]
impl Step for PutStep {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        state.check()?;
        self.delegate.initializing().await;

        let io = self.delegate.io();
        let cancel = state.token().clone();
        let result = tokio::select! {
            biased;
            _ = state.cancelled() => Err(StepError::Interrupted),
            result = self.worker.push(&self.ctx, &self.plan, io, cancel) => result.map_err(StepError::from),
        };

        match result {
            Ok(result) => {
                if result.succeeded() {
                    state.record_put(&self.plan.resource, result.info.clone());
                }
                self.delegate.completed(&self.plan, &result).await;
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
