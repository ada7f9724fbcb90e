// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process engine: runs the compiled step tree on the local runtime.

use crate::builder::StepBuilder;
use crate::delegate::BuildDelegate;
use crate::engine::{Engine, EngineBuild};
use crate::error::{EngineError, StepError};
use crate::step::{RunState, Step};
use async_trait::async_trait;
use kiln_adapters::{Worker, WorkerError};
use kiln_core::{Clock, Plan, SystemClock};
use kiln_storage::BuildDb;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;

pub const EXEC_ENGINE_NAME: &str = "exec.v1";

/// Everything needed to rebuild an exec build after a tracker restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecMetadata {
    pub plan: Plan,
}

/// Why a running build stopped being driven before its tree finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Interrupt the tree and finish as aborted
    Aborted,
    /// Stop without finishing; another tracker resumes later
    Released,
}

kiln_core::simple_display! {
    StopReason {
        Aborted => "aborted",
        Released => "released",
    }
}

pub struct ExecEngine<C: Clock = SystemClock> {
    worker: Arc<dyn Worker>,
    clock: C,
    release: CancellationToken,
}

impl ExecEngine<SystemClock> {
    pub fn new(worker: Arc<dyn Worker>) -> Self {
        Self::with_clock(worker, SystemClock)
    }
}

impl<C: Clock> ExecEngine<C> {
    pub fn with_clock(worker: Arc<dyn Worker>, clock: C) -> Self {
        Self { worker, clock, release: CancellationToken::new() }
    }

    fn compile(&self, build: Arc<dyn BuildDb>, metadata: ExecMetadata) -> Result<ExecBuild<C>, EngineError> {
        let encoded = serde_json::to_string(&metadata)?;
        let delegate = BuildDelegate::new(Arc::clone(&build), self.clock.clone());
        let builder = StepBuilder::new(build.id().clone(), Arc::clone(&self.worker), Arc::new(delegate.clone()));
        let step = builder.build(&metadata.plan);
        Ok(ExecBuild::new(build, encoded, delegate, step, self.release.clone()))
    }
}

#[async_trait]
impl<C: Clock> Engine for ExecEngine<C> {
    fn name(&self) -> &str {
        EXEC_ENGINE_NAME
    }

    async fn create_build(
        &self,
        build: Arc<dyn BuildDb>,
        plan: &Plan,
    ) -> Result<Arc<dyn EngineBuild>, EngineError> {
        let build = self.compile(build, ExecMetadata { plan: plan.clone() })?;
        Ok(Arc::new(build))
    }

    async fn lookup_build(&self, build: Arc<dyn BuildDb>) -> Result<Arc<dyn EngineBuild>, EngineError> {
        let metadata: ExecMetadata = serde_json::from_str(&build.engine_metadata())?;
        Ok(Arc::new(self.compile(build, metadata)?))
    }

    async fn release_all(&self) {
        tracing::info!("releasing exec builds");
        self.release.cancel();
    }
}

enum RunPhase {
    Compiled(Box<dyn Step>),
    Running,
    Finished,
}

/// One build driven by the [`ExecEngine`].
pub struct ExecBuild<C: Clock = SystemClock> {
    build: Arc<dyn BuildDb>,
    metadata: String,
    delegate: BuildDelegate<C>,
    phase: Mutex<RunPhase>,
    signals: mpsc::Sender<StopReason>,
    inbox: tokio::sync::Mutex<mpsc::Receiver<StopReason>>,
    release: CancellationToken,
}

impl<C: Clock> ExecBuild<C> {
    fn new(
        build: Arc<dyn BuildDb>,
        metadata: String,
        delegate: BuildDelegate<C>,
        step: Box<dyn Step>,
        release: CancellationToken,
    ) -> Self {
        // One pending abort is enough; repeats collapse into it
        let (signals, inbox) = mpsc::channel(1);
        Self {
            build,
            metadata,
            delegate,
            phase: Mutex::new(RunPhase::Compiled(step)),
            signals,
            inbox: tokio::sync::Mutex::new(inbox),
            release,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(*self.phase.lock(), RunPhase::Finished)
    }

    fn take_step(&self) -> Option<Box<dyn Step>> {
        let mut phase = self.phase.lock();
        match std::mem::replace(&mut *phase, RunPhase::Running) {
            RunPhase::Compiled(step) => Some(step),
            other => {
                *phase = other;
                None
            }
        }
    }
}

#[async_trait]
impl<C: Clock> EngineBuild for ExecBuild<C> {
    fn metadata(&self) -> String {
        self.metadata.clone()
    }

    async fn abort(&self) -> Result<(), EngineError> {
        if self.signals.try_send(StopReason::Aborted).is_err() {
            tracing::debug!(build_id = %self.build.id(), "abort already pending");
        }
        Ok(())
    }

    async fn resume(&self) {
        let build_id = self.build.id().clone();
        let Some(mut step) = self.take_step() else {
            tracing::warn!(%build_id, "build already resumed");
            return;
        };

        let cancel = CancellationToken::new();
        let state = RunState::new(cancel.clone());
        let span = tracing::info_span!("exec", %build_id);
        let mut process = AbortOnDropHandle::new(tokio::spawn(
            async move {
                let result = step.run(&state).await;
                (result, step.succeeded())
            }
            .instrument(span),
        ));

        let mut inbox = self.inbox.lock().await;
        let mut aborted = false;
        loop {
            let reason = tokio::select! {
                biased;
                joined = &mut process => {
                    // An abort that raced the tree's exit still counts
                    if !aborted && inbox.try_recv().is_ok_and(|r| r == StopReason::Aborted) {
                        aborted = true;
                    }
                    let (err, succeeded) = match joined {
                        Ok((result, succeeded)) => (result.err(), succeeded),
                        Err(e) => {
                            tracing::error!(%build_id, error = %e, "step tree panicked");
                            (Some(StepError::Worker(WorkerError::Failed(e.to_string()))), false)
                        }
                    };
                    self.delegate.finish(err.as_ref(), succeeded, aborted).await;
                    *self.phase.lock() = RunPhase::Finished;
                    return;
                }
                Some(reason) = inbox.recv() => reason,
                _ = self.release.cancelled() => StopReason::Released,
            };

            match reason {
                StopReason::Aborted => {
                    if !aborted {
                        tracing::info!(%build_id, "aborting build");
                        aborted = true;
                        cancel.cancel();
                    }
                }
                StopReason::Released => {
                    tracing::info!(%build_id, "build released");
                    process.abort();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
