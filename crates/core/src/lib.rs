// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-core: plans, build status and the versioned event model shared by
//! the storage and engine crates.

pub mod macros;

pub mod build;
pub mod clock;
pub mod event;
pub mod id;
pub mod plan;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use build::BuildStatus;
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{
    EnvelopeError, Event, EventEnvelope, EventVersion, Origin, OriginSource, ResourceSummary,
};
pub use id::{short, BuildId, PlanId};
pub use plan::{
    DependentGetPlan, GetPlan, Params, Plan, PlanFactory, PlanStep, PutPlan, TaskConfig, TaskPlan,
    TaskRunConfig,
};
pub use version::{version, MetadataField, Version, VersionInfo, VersionedResource};
