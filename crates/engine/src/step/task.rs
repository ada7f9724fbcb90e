// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{RunState, Step};
use crate::delegate::TaskDelegate;
use crate::error::StepError;
use async_trait::async_trait;
use kiln_adapters::{StepContext, Worker};
use kiln_core::TaskPlan;
use std::sync::Arc;

/// Runs a task container and records its exit status.
pub struct TaskStep {
    plan: TaskPlan,
    ctx: StepContext,
    worker: Arc<dyn Worker>,
    delegate: Box<dyn TaskDelegate>,
    exit_status: Option<i32>,
}

impl TaskStep {
    pub fn new(
        plan: TaskPlan,
        ctx: StepContext,
        worker: Arc<dyn Worker>,
        delegate: Box<dyn TaskDelegate>,
    ) -> Self {
        Self { plan, ctx, worker, delegate, exit_status: None }
    }
}

#[async_trait]
impl Step for TaskStep {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        state.check()?;
        self.delegate.initializing(&self.plan.config).await;
        self.delegate.starting().await;

        let io = self.delegate.io();
        let cancel = state.token().clone();
        let result = tokio::select! {
            biased;
            _ = state.cancelled() => Err(StepError::Interrupted),
            status = self.worker.run_task(&self.ctx, &self.plan, io, cancel) => status.map_err(StepError::from),
        };

        match result {
            Ok(status) => {
                self.exit_status = Some(status);
                self.delegate.finished(status).await;
                Ok(())
            }
            Err(e) => {
                self.delegate.failed(&e).await;
                Err(e)
            }
        }
    }

    fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }
}
