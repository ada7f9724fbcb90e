// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use kiln_adapters::WorkerError;
use kiln_storage::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Why a step could not run to completion.
///
/// A step that runs and reports an unsuccessful result is not an error;
/// see [`Step::succeeded`](crate::Step::succeeded).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("interrupted")]
    Interrupted,
    #[error("step timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("no version available for resource {0}")]
    MissingVersion(String),
    #[error("{}", join_errors(.0))]
    Multiple(Vec<StepError>),
}

impl StepError {
    /// Whether this error (or any part of it) came from cancellation.
    pub fn is_interrupted(&self) -> bool {
        match self {
            StepError::Interrupted => true,
            StepError::Multiple(errors) => errors.iter().any(StepError::is_interrupted),
            _ => false,
        }
    }

    /// Collapse a list of child errors: `None` when empty, the error itself
    /// when there is one.
    pub fn from_many(mut errors: Vec<StepError>) -> Option<StepError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(StepError::Multiple(errors)),
        }
    }
}

fn join_errors(errors: &[StepError]) -> String {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("{} errors occurred: {}", errors.len(), messages.join("; "))
}

/// Errors from engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown engine: {0}")]
    UnknownEngine(String),
    #[error("no engines registered")]
    NoEngines,
    #[error("invalid engine metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
