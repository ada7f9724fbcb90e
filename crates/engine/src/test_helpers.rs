// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers shared by the engine's unit tests.

use crate::error::StepError;
use crate::step::{RunState, Step};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Sync wrapper for async execution in parameterized tests.
pub(crate) fn run_async<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(f)
}

/// Names of scripted steps in the order they started.
#[derive(Clone, Default)]
pub(crate) struct RunLog(Arc<Mutex<Vec<String>>>);

impl RunLog {
    pub(crate) fn names(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn push(&self, name: &str) {
        self.0.lock().push(name.to_string());
    }
}

#[derive(Clone)]
enum Outcome {
    Succeed,
    Fail,
    Error(StepError),
    /// Block until interrupted
    Hang,
}

/// A step with a fixed outcome, for exercising combinators.
pub(crate) struct ScriptedStep {
    name: String,
    log: RunLog,
    outcome: Outcome,
    delay: Option<Duration>,
    succeeded: bool,
}

impl ScriptedStep {
    fn new(name: &str, log: &RunLog, outcome: Outcome) -> Self {
        Self { name: name.to_string(), log: log.clone(), outcome, delay: None, succeeded: false }
    }

    pub(crate) fn succeed(name: &str, log: &RunLog) -> Box<dyn Step> {
        Box::new(Self::new(name, log, Outcome::Succeed))
    }

    pub(crate) fn fail(name: &str, log: &RunLog) -> Box<dyn Step> {
        Box::new(Self::new(name, log, Outcome::Fail))
    }

    pub(crate) fn error(name: &str, log: &RunLog, err: StepError) -> Box<dyn Step> {
        Box::new(Self::new(name, log, Outcome::Error(err)))
    }

    pub(crate) fn hang(name: &str, log: &RunLog) -> Box<dyn Step> {
        Box::new(Self::new(name, log, Outcome::Hang))
    }

    /// Succeeds after `delay` unless interrupted first.
    pub(crate) fn slow(name: &str, log: &RunLog, delay: Duration) -> Box<dyn Step> {
        Box::new(Self { delay: Some(delay), ..Self::new(name, log, Outcome::Succeed) })
    }
}

#[async_trait]
impl Step for ScriptedStep {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError> {
        self.log.push(&self.name);
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = state.cancelled() => return Err(StepError::Interrupted),
            }
        }
        match self.outcome.clone() {
            Outcome::Succeed => {
                self.succeeded = true;
                Ok(())
            }
            Outcome::Fail => Ok(()),
            Outcome::Error(e) => Err(e),
            Outcome::Hang => {
                state.cancelled().await;
                Err(StepError::Interrupted)
            }
        }
    }

    fn succeeded(&self) -> bool {
        self.succeeded
    }
}
