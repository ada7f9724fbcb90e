// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-node delegates handed out by [`BuildDelegate`].

use super::{BuildDelegate, EventWriter, GetDelegate, PutDelegate, TaskDelegate};
use crate::error::StepError;
use async_trait::async_trait;
use kiln_adapters::{ResourceResult, StepIo};
use kiln_core::{
    Clock, Event, GetPlan, Origin, OriginSource, PlanId, PutPlan, ResourceSummary, TaskConfig,
    VersionedResource,
};
use std::sync::Arc;

fn step_io<C: Clock>(build: &BuildDelegate<C>, origin: &PlanId) -> StepIo {
    let writer = |source| {
        let origin = Origin::new(origin.clone()).with_source(source);
        Arc::new(EventWriter::new(build.build().clone(), origin))
    };
    StepIo::new(writer(OriginSource::Stdout), writer(OriginSource::Stderr))
}

fn error_event(origin: &PlanId, err: &StepError) -> Event {
    Event::Error { origin: Some(Origin::new(origin.clone())), message: err.to_string() }
}

pub(super) struct BuildTaskDelegate<C: Clock> {
    build: BuildDelegate<C>,
    origin: PlanId,
}

impl<C: Clock> BuildTaskDelegate<C> {
    pub(super) fn new(build: BuildDelegate<C>, origin: PlanId) -> Self {
        Self { build, origin }
    }

    fn origin(&self) -> Origin {
        Origin::new(self.origin.clone())
    }
}

#[async_trait]
impl<C: Clock> TaskDelegate for BuildTaskDelegate<C> {
    async fn initializing(&self, config: &TaskConfig) {
        let event =
            Event::InitializeTask { origin: self.origin(), time: self.build.now(), config: config.clone() };
        self.build.save_event(event).await;
    }

    async fn starting(&self) {
        let event = Event::StartTask { origin: self.origin(), time: self.build.now() };
        self.build.save_event(event).await;
    }

    async fn finished(&self, exit_status: i32) {
        tracing::debug!(origin = %self.origin, exit_status, "task finished");
        let event = Event::FinishTask { origin: self.origin(), time: self.build.now(), exit_status };
        self.build.save_event(event).await;
    }

    async fn failed(&self, err: &StepError) {
        tracing::warn!(origin = %self.origin, error = %err, "task errored");
        self.build.save_event(error_event(&self.origin, err)).await;
    }

    fn io(&self) -> StepIo {
        step_io(&self.build, &self.origin)
    }
}

pub(super) struct BuildGetDelegate<C: Clock> {
    build: BuildDelegate<C>,
    origin: PlanId,
}

impl<C: Clock> BuildGetDelegate<C> {
    pub(super) fn new(build: BuildDelegate<C>, origin: PlanId) -> Self {
        Self { build, origin }
    }
}

#[async_trait]
impl<C: Clock> GetDelegate for BuildGetDelegate<C> {
    async fn initializing(&self) {
        let event = Event::InitializeGet { origin: Origin::new(self.origin.clone()), time: self.build.now() };
        self.build.save_event(event).await;
    }

    async fn completed(&self, plan: &GetPlan, result: &ResourceResult) {
        let event = Event::FinishGet {
            origin: Origin::new(self.origin.clone()),
            time: self.build.now(),
            plan: ResourceSummary {
                name: plan.name.clone(),
                resource: plan.resource.clone(),
                resource_type: plan.resource_type.clone(),
            },
            exit_status: result.exit_status,
            version: result.info.version.clone(),
            metadata: result.info.metadata.clone(),
        };
        self.build.save_event(event).await;

        if !result.succeeded() {
            return;
        }
        let input = VersionedResource::new(&plan.resource, &plan.resource_type, result.info.clone());
        if let Err(e) = self.build.build().save_input(&input).await {
            tracing::error!(
                build_id = %self.build.build().id(),
                resource = %plan.resource,
                error = %e,
                "failed to save input"
            );
        }
        if !self.build.implicit_outputs().register(input) {
            tracing::debug!(resource = %plan.resource, "resource already put, not an implicit output");
        }
    }

    async fn failed(&self, err: &StepError) {
        tracing::warn!(origin = %self.origin, error = %err, "get errored");
        self.build.save_event(error_event(&self.origin, err)).await;
    }

    fn io(&self) -> StepIo {
        step_io(&self.build, &self.origin)
    }
}

pub(super) struct BuildPutDelegate<C: Clock> {
    build: BuildDelegate<C>,
    origin: PlanId,
}

impl<C: Clock> BuildPutDelegate<C> {
    pub(super) fn new(build: BuildDelegate<C>, origin: PlanId) -> Self {
        Self { build, origin }
    }
}

#[async_trait]
impl<C: Clock> PutDelegate for BuildPutDelegate<C> {
    async fn initializing(&self) {
        let event = Event::InitializePut { origin: Origin::new(self.origin.clone()), time: self.build.now() };
        self.build.save_event(event).await;
    }

    async fn completed(&self, plan: &PutPlan, result: &ResourceResult) {
        self.build.implicit_outputs().unregister(&plan.resource);

        let event = Event::FinishPut {
            origin: Origin::new(self.origin.clone()),
            time: self.build.now(),
            plan: ResourceSummary {
                name: plan.name.clone(),
                resource: plan.resource.clone(),
                resource_type: plan.resource_type.clone(),
            },
            exit_status: result.exit_status,
            version: result.info.version.clone(),
            metadata: result.info.metadata.clone(),
        };
        self.build.save_event(event).await;

        if !result.succeeded() {
            return;
        }
        let output = VersionedResource::new(&plan.resource, &plan.resource_type, result.info.clone());
        if let Err(e) = self.build.build().save_output(&output, true).await {
            tracing::error!(
                build_id = %self.build.build().id(),
                resource = %plan.resource,
                error = %e,
                "failed to save output"
            );
        }
    }

    async fn failed(&self, err: &StepError) {
        tracing::warn!(origin = %self.origin, error = %err, "put errored");
        self.build.save_event(error_event(&self.origin, err)).await;
    }

    fn io(&self) -> StepIo {
        step_io(&self.build, &self.origin)
    }
}
