// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delegates: translate step lifecycle callbacks into persisted events.
//!
//! Every callback persists exactly one event through [`BuildDb::save_event`].
//! Persistence failures are logged and swallowed; the event stream records
//! what happened but never decides control flow.

mod implicit;
mod leaf;
mod writer;

pub use implicit::ImplicitOutputs;
pub use writer::EventWriter;

use crate::error::StepError;
use async_trait::async_trait;
use kiln_adapters::{ResourceResult, StepIo};
use kiln_core::{BuildStatus, Clock, Event, GetPlan, PlanId, PutPlan, SystemClock, TaskConfig};
use kiln_storage::BuildDb;
use leaf::{BuildGetDelegate, BuildPutDelegate, BuildTaskDelegate};
use std::sync::Arc;

/// Lifecycle callbacks of a task step.
#[async_trait]
pub trait TaskDelegate: Send + Sync {
    async fn initializing(&self, config: &TaskConfig);
    async fn starting(&self);
    async fn finished(&self, exit_status: i32);
    async fn failed(&self, err: &StepError);
    fn io(&self) -> StepIo;
}

/// Lifecycle callbacks of a get (or dependent get) step.
#[async_trait]
pub trait GetDelegate: Send + Sync {
    async fn initializing(&self);
    async fn completed(&self, plan: &GetPlan, result: &ResourceResult);
    async fn failed(&self, err: &StepError);
    fn io(&self) -> StepIo;
}

/// Lifecycle callbacks of a put step.
#[async_trait]
pub trait PutDelegate: Send + Sync {
    async fn initializing(&self);
    async fn completed(&self, plan: &PutPlan, result: &ResourceResult);
    async fn failed(&self, err: &StepError);
    fn io(&self) -> StepIo;
}

/// Hands out a delegate per leaf node, keyed by the node's plan id.
pub trait DelegateFactory: Send + Sync {
    fn task(&self, origin: &PlanId) -> Box<dyn TaskDelegate>;
    fn get(&self, origin: &PlanId) -> Box<dyn GetDelegate>;
    fn put(&self, origin: &PlanId) -> Box<dyn PutDelegate>;
}

/// Whole-build delegate. Clones share the implicit-output candidates.
#[derive(Clone)]
pub struct BuildDelegate<C: Clock = SystemClock> {
    build: Arc<dyn BuildDb>,
    clock: C,
    implicit: Arc<ImplicitOutputs>,
}

impl<C: Clock> BuildDelegate<C> {
    pub fn new(build: Arc<dyn BuildDb>, clock: C) -> Self {
        Self { build, clock, implicit: Arc::new(ImplicitOutputs::default()) }
    }

    pub fn implicit_outputs(&self) -> &ImplicitOutputs {
        &self.implicit
    }

    /// Decide and persist the terminal status.
    ///
    /// Priority: aborted, then errored, then succeeded, then failed.
    /// Implicit outputs are promoted only when the build succeeded.
    pub async fn finish(&self, err: Option<&StepError>, succeeded: bool, aborted: bool) -> BuildStatus {
        let build_id = self.build.id();
        let status = if aborted {
            tracing::info!(%build_id, "build aborted");
            BuildStatus::Aborted
        } else if let Some(e) = err {
            tracing::info!(%build_id, error = %e, "build errored");
            BuildStatus::Errored
        } else if succeeded {
            for output in self.implicit.take() {
                match self.build.save_output(&output, false).await {
                    Ok(()) => tracing::info!(%build_id, resource = %output.resource, "saved implicit output"),
                    Err(e) => tracing::error!(
                        %build_id,
                        resource = %output.resource,
                        error = %e,
                        "failed to save implicit output"
                    ),
                }
            }
            tracing::info!(%build_id, "build succeeded");
            BuildStatus::Succeeded
        } else {
            tracing::info!(%build_id, "build failed");
            BuildStatus::Failed
        };

        if let Err(e) = self.build.finish(status).await {
            tracing::error!(%build_id, %status, error = %e, "failed to finish build");
        }
        status
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.epoch_secs()
    }

    pub(crate) fn build(&self) -> &Arc<dyn BuildDb> {
        &self.build
    }

    pub(crate) async fn save_event(&self, event: Event) {
        tracing::trace!(build_id = %self.build.id(), event = %event.log_summary(), "saving event");
        if let Err(e) = self.build.save_event(&event).await {
            tracing::error!(
                build_id = %self.build.id(),
                event = event.name(),
                error = %e,
                "failed to save event"
            );
        }
    }
}

impl<C: Clock> DelegateFactory for BuildDelegate<C> {
    fn task(&self, origin: &PlanId) -> Box<dyn TaskDelegate> {
        Box::new(BuildTaskDelegate::new(self.clone(), origin.clone()))
    }

    fn get(&self, origin: &PlanId) -> Box<dyn GetDelegate> {
        Box::new(BuildGetDelegate::new(self.clone(), origin.clone()))
    }

    fn put(&self, origin: &PlanId) -> Box<dyn PutDelegate> {
        Box::new(BuildPutDelegate::new(self.clone(), origin.clone()))
    }
}

#[cfg(test)]
#[path = "../delegate_tests.rs"]
mod tests;
