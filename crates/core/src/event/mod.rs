// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build events.
//!
//! Every event appended to a build's stream carries the [`Origin`] of the
//! plan node that produced it. Events serialize as
//! `{"event": "finish-task", "data": {...}}`; [`EventEnvelope`] adds the
//! per-type version on the wire.

mod envelope;

pub use envelope::{EnvelopeError, EventEnvelope, EventVersion};

use crate::build::BuildStatus;
use crate::id::PlanId;
use crate::plan::TaskConfig;
use crate::version::{MetadataField, Version};
use serde::{Deserialize, Serialize};

/// Which stream of a step a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginSource {
    Stdout,
    Stderr,
}

/// The plan node an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub id: PlanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<OriginSource>,
}

impl Origin {
    pub fn new(id: impl Into<PlanId>) -> Self {
        Self { id: id.into(), source: None }
    }

    pub fn with_source(mut self, source: OriginSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// Identifying fields of the get/put a finish event reports on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub name: String,
    pub resource: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Event {
    InitializeTask {
        origin: Origin,
        time: i64,
        config: TaskConfig,
    },
    StartTask {
        origin: Origin,
        time: i64,
    },
    FinishTask {
        origin: Origin,
        time: i64,
        exit_status: i32,
    },
    InitializeGet {
        origin: Origin,
        time: i64,
    },
    FinishGet {
        origin: Origin,
        time: i64,
        plan: ResourceSummary,
        exit_status: i32,
        #[serde(default)]
        version: Version,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        metadata: Vec<MetadataField>,
    },
    InitializePut {
        origin: Origin,
        time: i64,
    },
    FinishPut {
        origin: Origin,
        time: i64,
        plan: ResourceSummary,
        exit_status: i32,
        #[serde(default)]
        version: Version,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        metadata: Vec<MetadataField>,
    },
    Status {
        status: BuildStatus,
        time: i64,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<Origin>,
        message: String,
    },
    Log {
        origin: Origin,
        payload: String,
    },
}

impl Event {
    /// Wire name of the event type.
    pub fn name(&self) -> &'static str {
        match self {
            Event::InitializeTask { .. } => "initialize-task",
            Event::StartTask { .. } => "start-task",
            Event::FinishTask { .. } => "finish-task",
            Event::InitializeGet { .. } => "initialize-get",
            Event::FinishGet { .. } => "finish-get",
            Event::InitializePut { .. } => "initialize-put",
            Event::FinishPut { .. } => "finish-put",
            Event::Status { .. } => "status",
            Event::Error { .. } => "error",
            Event::Log { .. } => "log",
        }
    }

    /// Current version written for this event type.
    pub fn version(&self) -> EventVersion {
        // Every name above is registered in the version table
        EventVersion::current(self.name()).unwrap_or(EventVersion::new(1, 0))
    }

    /// The plan node that produced this event, if any.
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Event::InitializeTask { origin, .. }
            | Event::StartTask { origin, .. }
            | Event::FinishTask { origin, .. }
            | Event::InitializeGet { origin, .. }
            | Event::FinishGet { origin, .. }
            | Event::InitializePut { origin, .. }
            | Event::FinishPut { origin, .. }
            | Event::Log { origin, .. } => Some(origin),
            Event::Error { origin, .. } => origin.as_ref(),
            Event::Status { .. } => None,
        }
    }

    /// Whether this is the terminal event of a plan node.
    pub fn is_terminal_for_node(&self) -> bool {
        matches!(
            self,
            Event::FinishTask { .. }
                | Event::FinishGet { .. }
                | Event::FinishPut { .. }
                | Event::Error { origin: Some(_), .. }
        )
    }

    /// One-line summary for tracing output.
    pub fn log_summary(&self) -> String {
        let name = self.name();
        match self {
            Event::Status { status, .. } => format!("{name} status={status}"),
            Event::FinishTask { origin, exit_status, .. }
            | Event::FinishGet { origin, exit_status, .. }
            | Event::FinishPut { origin, exit_status, .. } => {
                format!("{name} origin={} exit_status={exit_status}", origin.id)
            }
            Event::Error { origin, message } => match origin {
                Some(origin) => format!("{name} origin={} message={message}", origin.id),
                None => format!("{name} message={message}"),
            },
            _ => match self.origin() {
                Some(origin) => format!("{name} origin={}", origin.id),
                None => name.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
