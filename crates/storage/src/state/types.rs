// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure type definitions for materialized state records.

use kiln_core::{BuildId, BuildStatus, VersionedResource};
use serde::{Deserialize, Serialize};

/// Persisted attributes of one build.
///
/// Events, inputs and outputs live in their own tables of
/// [`MaterializedState`](super::MaterializedState) so a row stays cheap to
/// clone into a [`StoredBuild`](crate::StoredBuild) cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRow {
    pub id: BuildId,
    /// Owning job, `None` for one-off builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    pub status: BuildStatus,
    /// Name of the engine tracking this build; empty until started
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub engine_metadata: String,
    /// Public plan recorded at start
    #[serde(default)]
    pub plan: serde_json::Value,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_by: Option<String>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl BuildRow {
    pub fn new(id: BuildId, job: Option<String>, created_at_ms: u64) -> Self {
        Self {
            id,
            job,
            status: BuildStatus::Pending,
            engine: String::new(),
            engine_metadata: String::new(),
            plan: serde_json::Value::Null,
            aborted: false,
            tracked_by: None,
            created_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedOutput {
    pub resource: VersionedResource,
    /// `true` when produced by a put, `false` when promoted from a get
    pub explicit: bool,
}
