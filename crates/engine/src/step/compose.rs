// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Combinator steps.

use super::{RunState, Step};
use crate::error::StepError;
use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// No-op. Always succeeds.
#[derive(Debug, Default)]
pub struct Identity;

#[async_trait]
impl Step for Identity {
    async fn run(&mut self, _state: &RunState) -> Result<(), StepError> {
        Ok(())
    }

    fn succeeded(&self) -> bool {
        true
    }
}

/// Runs every child concurrently and waits for all of them.
///
/// Children are never cancelled because a sibling failed or errored.
/// Every child error is reported.
pub struct Aggregate {
    steps: Vec<Box<dyn Step>>,
}

impl Aggregate {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl Step for Aggregate {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        let results = join_all(self.steps.iter_mut().map(|step| step.run(state))).await;
        let errors: Vec<StepError> = results.into_iter().filter_map(Result::err).collect();
        match StepError::from_many(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn succeeded(&self) -> bool {
        self.steps.iter().all(|step| step.succeeded())
    }
}

/// Runs children concurrently, at most `limit` at a time.
///
/// A `limit` of zero means no limit. With `fail_fast`, the first child that
/// fails or errors interrupts its running siblings and keeps pending ones
/// from starting; the interruptions it caused are not reported as errors.
pub struct InParallel {
    steps: Vec<Box<dyn Step>>,
    limit: usize,
    fail_fast: bool,
    skipped: bool,
}

impl InParallel {
    pub fn new(steps: Vec<Box<dyn Step>>, limit: usize, fail_fast: bool) -> Self {
        Self { steps, limit, fail_fast, skipped: false }
    }
}

#[async_trait]
impl Step for InParallel {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        state.check()?;
        let limit = if self.limit == 0 { self.steps.len().max(1) } else { self.limit };
        let fail_fast = self.fail_fast;
        let group = state.token().child_token();
        let child = state.with_cancel(group.clone());

        let futures: Vec<_> = self
            .steps
            .iter_mut()
            .map(|step| {
                let (group, child) = (&group, &child);
                async move {
                    if group.is_cancelled() {
                        return None;
                    }
                    let result = step.run(child).await;
                    if fail_fast && !group.is_cancelled() && (result.is_err() || !step.succeeded()) {
                        tracing::debug!("step failed, interrupting parallel siblings");
                        group.cancel();
                    }
                    Some(result)
                }
            })
            .collect();
        let results: Vec<Option<Result<(), StepError>>> = stream::iter(futures)
            .buffer_unordered(limit)
            .collect()
            .await;

        state.check()?;
        self.skipped = results.iter().any(Option::is_none);
        let errors: Vec<StepError> = results
            .into_iter()
            .flatten()
            .filter_map(Result::err)
            .filter(|e| !e.is_interrupted())
            .collect();
        match StepError::from_many(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn succeeded(&self) -> bool {
        !self.skipped && self.steps.iter().all(|step| step.succeeded())
    }
}

/// Runs children in order.
///
/// A failed child does not stop the sequence; an error does.
pub struct Do {
    steps: Vec<Box<dyn Step>>,
}

impl Do {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl Step for Do {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        for step in &mut self.steps {
            state.check()?;
            step.run(state).await?;
        }
        Ok(())
    }

    fn succeeded(&self) -> bool {
        self.steps.iter().all(|step| step.succeeded())
    }
}

/// Interrupts its child once the duration elapses.
pub struct Timeout {
    step: Box<dyn Step>,
    duration: Duration,
    timed_out: bool,
}

impl Timeout {
    pub fn new(step: Box<dyn Step>, duration: Duration) -> Self {
        Self { step, duration, timed_out: false }
    }
}

#[async_trait]
impl Step for Timeout {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        let duration = self.duration;
        let cancel = state.token().child_token();
        let child = state.with_cancel(cancel.clone());

        let mut run = self.step.run(&child);
        let (result, timed_out) = tokio::select! {
            result = &mut run => (result, false),
            _ = tokio::time::sleep(duration) => {
                tracing::info!(?duration, "step timed out, interrupting");
                cancel.cancel();
                // The child's own outcome is superseded by the timeout
                let _ = run.await;
                (Err(StepError::TimedOut(duration)), true)
            }
        };
        self.timed_out = timed_out;
        result
    }

    fn succeeded(&self) -> bool {
        !self.timed_out && self.step.succeeded()
    }
}

/// Swallows failure and every error except interruption.
pub struct Try {
    step: Box<dyn Step>,
}

impl Try {
    pub fn new(step: Box<dyn Step>) -> Self {
        Self { step }
    }
}

#[async_trait]
impl Step for Try {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        match self.step.run(state).await {
            Err(e) if e.is_interrupted() => Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring error under try");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn succeeded(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Run the hook iff the step succeeded
    OnSuccess,
    /// Run the hook iff the step completed without succeeding
    OnFailure,
    /// Always run the hook
    Ensure,
    /// Run the hook iff the run was aborted while the step ran
    OnAbort,
    /// Run the hook iff the step errored for any reason but interruption
    OnError,
}

kiln_core::simple_display! {
    HookKind {
        OnSuccess => "on_success",
        OnFailure => "on_failure",
        Ensure => "ensure",
        OnAbort => "on_abort",
        OnError => "on_error",
    }
}

/// A step followed by a conditional hook.
///
/// The step's error always wins: `OnSuccess` and `OnFailure` skip the hook
/// on error, `Ensure` runs it and still returns the step's error.
/// `OnAbort` and `OnError` only ever run on error and return that error;
/// their hook's own error is logged and dropped. An abort hook runs on a
/// fresh token since the run's own is already cancelled.
pub struct Hook {
    kind: HookKind,
    step: Box<dyn Step>,
    next: Box<dyn Step>,
    next_ran: bool,
}

impl Hook {
    pub fn new(kind: HookKind, step: Box<dyn Step>, next: Box<dyn Step>) -> Self {
        Self { kind, step, next, next_ran: false }
    }

    pub fn on_success(step: Box<dyn Step>, next: Box<dyn Step>) -> Self {
        Self::new(HookKind::OnSuccess, step, next)
    }

    pub fn on_failure(step: Box<dyn Step>, next: Box<dyn Step>) -> Self {
        Self::new(HookKind::OnFailure, step, next)
    }

    pub fn ensure(step: Box<dyn Step>, next: Box<dyn Step>) -> Self {
        Self::new(HookKind::Ensure, step, next)
    }

    pub fn on_abort(step: Box<dyn Step>, next: Box<dyn Step>) -> Self {
        Self::new(HookKind::OnAbort, step, next)
    }

    pub fn on_error(step: Box<dyn Step>, next: Box<dyn Step>) -> Self {
        Self::new(HookKind::OnError, step, next)
    }

    async fn run_next(&mut self, state: &RunState) -> Result<(), StepError> {
        state.check()?;
        tracing::debug!(hook = %self.kind, "running hook");
        self.next_ran = true;
        self.next.run(state).await
    }
}

#[async_trait]
impl Step for Hook {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        self.next_ran = false;
        let result = self.step.run(state).await;

        match self.kind {
            HookKind::OnSuccess | HookKind::OnFailure => {
                result?;
                let wanted = self.step.succeeded() == (self.kind == HookKind::OnSuccess);
                if !wanted {
                    return Ok(());
                }
                self.run_next(state).await
            }
            HookKind::Ensure => {
                let hook = self.run_next(state).await;
                result.and(hook)
            }
            HookKind::OnAbort => {
                if matches!(&result, Err(e) if e.is_interrupted()) && state.is_aborted() {
                    let detached = state.with_cancel(CancellationToken::new());
                    if let Err(e) = self.run_next(&detached).await {
                        tracing::warn!(hook = %self.kind, error = %e, "hook errored");
                    }
                }
                result
            }
            HookKind::OnError => {
                if matches!(&result, Err(e) if !e.is_interrupted()) {
                    if let Err(e) = self.run_next(state).await {
                        tracing::warn!(hook = %self.kind, error = %e, "hook errored");
                    }
                }
                result
            }
        }
    }

    fn succeeded(&self) -> bool {
        match self.kind {
            HookKind::OnSuccess if self.next_ran => self.next.succeeded(),
            HookKind::OnSuccess | HookKind::OnFailure | HookKind::OnAbort | HookKind::OnError => {
                self.step.succeeded()
            }
            HookKind::Ensure => self.step.succeeded() && self.next_ran && self.next.succeeded(),
        }
    }
}

/// One child per attempt, run in order until one succeeds.
///
/// Errors other than interruption move on to the next attempt. The outcome
/// is that of the last attempt run.
pub struct Retry {
    attempts: Vec<Box<dyn Step>>,
    last: Option<usize>,
}

impl Retry {
    pub fn new(attempts: Vec<Box<dyn Step>>) -> Self {
        Self { attempts, last: None }
    }
}

#[async_trait]
impl Step for Retry {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        self.last = None;
        let count = self.attempts.len();
        for (i, attempt) in self.attempts.iter_mut().enumerate() {
            state.check()?;
            self.last = Some(i);
            let result = attempt.run(state).await;
            match result {
                Ok(()) if attempt.succeeded() => return Ok(()),
                Ok(()) => tracing::debug!(attempt = i + 1, "attempt failed"),
                Err(e) if e.is_interrupted() || i + 1 == count => return Err(e),
                Err(e) => tracing::warn!(attempt = i + 1, error = %e, "attempt errored"),
            }
        }
        Ok(())
    }

    fn succeeded(&self) -> bool {
        match self.last {
            Some(i) => self.attempts.get(i).is_some_and(|attempt| attempt.succeeded()),
            None => self.attempts.is_empty(),
        }
    }
}
