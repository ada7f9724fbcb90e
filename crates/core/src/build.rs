// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a build.
///
/// Moves forward only: `pending` → `started` → one terminal status, set
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Started,
    Succeeded,
    Failed,
    Errored,
    Aborted,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Errored | BuildStatus::Aborted
        )
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        match self {
            BuildStatus::Pending => next != BuildStatus::Pending,
            BuildStatus::Started => next.is_terminal(),
            _ => false,
        }
    }
}

crate::simple_display! {
    BuildStatus {
        Pending => "pending",
        Started => "started",
        Succeeded => "succeeded",
        Failed => "failed",
        Errored => "errored",
        Aborted => "aborted",
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
