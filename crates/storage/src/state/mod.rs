// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

mod types;

pub use types::{BuildRow, SavedOutput};

use kiln_core::{BuildId, BuildStatus, EventEnvelope, VersionedResource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One durable mutation of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOp {
    BuildCreated {
        id: BuildId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job: Option<String>,
        created_at_ms: u64,
    },
    BuildStarted {
        id: BuildId,
        engine: String,
        metadata: String,
        plan: serde_json::Value,
        started_at_ms: u64,
    },
    BuildMarkedAborted {
        id: BuildId,
    },
    BuildFinished {
        id: BuildId,
        status: BuildStatus,
        finished_at_ms: u64,
    },
    BuildTracked {
        id: BuildId,
        tracker: String,
    },
    EventSaved {
        id: BuildId,
        event: EventEnvelope,
    },
    InputSaved {
        id: BuildId,
        input: VersionedResource,
    },
    OutputSaved {
        id: BuildId,
        output: VersionedResource,
        explicit: bool,
    },
}

/// Materialized state built from WAL operations
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub builds: HashMap<BuildId, BuildRow>,
    #[serde(default)]
    pub events: HashMap<BuildId, Vec<EventEnvelope>>,
    #[serde(default)]
    pub inputs: HashMap<BuildId, Vec<VersionedResource>>,
    #[serde(default)]
    pub outputs: HashMap<BuildId, Vec<SavedOutput>>,
}

impl MaterializedState {
    pub fn build(&self, id: &str) -> Option<&BuildRow> {
        self.builds.get(id)
    }

    /// Whether `op` would change a build row if applied now.
    ///
    /// Status transitions are guarded here so that the store can refuse a
    /// losing `start` or a second `finish` without writing anything.
    pub fn accepts(&self, op: &StoreOp) -> bool {
        match op {
            StoreOp::BuildCreated { id, .. } => !self.builds.contains_key(id),
            StoreOp::BuildStarted { id, .. } => self
                .builds
                .get(id)
                .is_some_and(|b| b.status == BuildStatus::Pending && !b.aborted),
            StoreOp::BuildFinished { id, status, .. } => self
                .builds
                .get(id)
                .is_some_and(|b| b.status.can_transition_to(*status)),
            StoreOp::BuildMarkedAborted { id }
            | StoreOp::BuildTracked { id, .. }
            | StoreOp::EventSaved { id, .. }
            | StoreOp::InputSaved { id, .. }
            | StoreOp::OutputSaved { id, .. } => self.builds.contains_key(id),
        }
    }

    /// Apply one operation.
    ///
    /// Row transitions are idempotent: re-applying a create, start, abort
    /// or finish leaves the row unchanged. Saved events, inputs and outputs
    /// are appended, so callers apply each WAL entry exactly once.
    pub fn apply(&mut self, op: &StoreOp) {
        if !self.accepts(op) {
            return;
        }
        match op {
            StoreOp::BuildCreated { id, job, created_at_ms } => {
                self.builds.insert(id.clone(), BuildRow::new(id.clone(), job.clone(), *created_at_ms));
            }
            StoreOp::BuildStarted { id, engine, metadata, plan, started_at_ms } => {
                if let Some(row) = self.builds.get_mut(id) {
                    row.status = BuildStatus::Started;
                    row.engine = engine.clone();
                    row.engine_metadata = metadata.clone();
                    row.plan = plan.clone();
                    row.started_at_ms = Some(*started_at_ms);
                }
            }
            StoreOp::BuildMarkedAborted { id } => {
                if let Some(row) = self.builds.get_mut(id) {
                    row.aborted = true;
                }
            }
            StoreOp::BuildFinished { id, status, finished_at_ms } => {
                if let Some(row) = self.builds.get_mut(id) {
                    row.status = *status;
                    row.finished_at_ms = Some(*finished_at_ms);
                }
            }
            StoreOp::BuildTracked { id, tracker } => {
                if let Some(row) = self.builds.get_mut(id) {
                    row.tracked_by = Some(tracker.clone());
                }
            }
            StoreOp::EventSaved { id, event } => {
                self.events.entry(id.clone()).or_default().push(event.clone());
            }
            StoreOp::InputSaved { id, input } => {
                self.inputs.entry(id.clone()).or_default().push(input.clone());
            }
            StoreOp::OutputSaved { id, output, explicit } => {
                self.outputs
                    .entry(id.clone())
                    .or_default()
                    .push(SavedOutput { resource: output.clone(), explicit: *explicit });
            }
        }
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
