// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executable step tree.
//!
//! A [`Step`] runs once and then reports whether it succeeded. `run`
//! returning `Err` means the step could not complete at all (worker
//! unavailable, interrupted, timed out); `Ok` with `succeeded() == false`
//! means it ran and failed. Combinators compose both signals.

mod compose;
mod get;
mod put;
mod task;

pub use compose::{Aggregate, Do, Hook, HookKind, Identity, InParallel, Retry, Timeout, Try};
pub use get::GetStep;
pub use put::PutStep;
pub use task::TaskStep;

use crate::error::StepError;
use async_trait::async_trait;
use kiln_core::VersionInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[async_trait]
pub trait Step: Send {
    async fn run(&mut self, state: &RunState) -> Result<(), StepError>;

    /// Meaningful only after `run` returned. `false` before that.
    fn succeeded(&self) -> bool;
}

/// State shared by every step of one tree run.
///
/// Carries the interruption signal and the versions produced by puts, which
/// dependent gets read back. The token the run started with is kept as the
/// abort signal; tokens swapped in later (timeouts, fail-fast groups) only
/// interrupt.
#[derive(Clone)]
pub struct RunState {
    cancel: CancellationToken,
    abort: CancellationToken,
    puts: Arc<Mutex<HashMap<String, VersionInfo>>>,
}

impl RunState {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { abort: cancel.clone(), cancel, puts: Arc::default() }
    }

    /// Same shared results and abort signal, different interruption signal.
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self { cancel, abort: self.abort.clone(), puts: Arc::clone(&self.puts) }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the whole run was aborted, as opposed to interrupted by a
    /// timeout or a failing sibling.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// `Err(Interrupted)` once the run has been interrupted.
    pub fn check(&self) -> Result<(), StepError> {
        if self.cancel.is_cancelled() {
            return Err(StepError::Interrupted);
        }
        Ok(())
    }

    /// Record the version a put produced; later puts of the same resource win.
    pub fn record_put(&self, resource: &str, info: VersionInfo) {
        self.puts.lock().insert(resource.to_string(), info);
    }

    pub fn put_result(&self, resource: &str) -> Option<VersionInfo> {
        self.puts.lock().get(resource).cloned()
    }
}

#[cfg(test)]
#[path = "../step_tests.rs"]
mod tests;
