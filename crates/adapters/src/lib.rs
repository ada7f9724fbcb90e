// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-adapters: collaborators injected into the engine
//!
//! The worker runtime that runs tasks and fetches or pushes resources, and
//! the metrics sink that brackets each resumed build.

pub mod metrics;
pub mod worker;

pub use metrics::{MetricsSink, TracingMetrics};
pub use worker::{LogSink, NullSink, ResourceResult, StepContext, StepIo, Worker, WorkerError};

#[cfg(any(test, feature = "test-support"))]
pub use metrics::{FakeMetrics, MetricsCall};
#[cfg(any(test, feature = "test-support"))]
pub use worker::{FakeWorker, Script, WorkerCall, WorkerCallKind};
