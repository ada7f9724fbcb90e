// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build lifecycle metrics hook.

use async_trait::async_trait;
use kiln_core::{BuildId, BuildStatus};
use std::time::Duration;

/// Receives the start and finish of every tracked resume.
#[async_trait]
pub trait MetricsSink: Send + Sync + 'static {
    async fn build_started(&self, build_id: &BuildId);

    async fn build_finished(&self, build_id: &BuildId, status: BuildStatus, duration: Duration);
}

/// Emits metrics as structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

#[async_trait]
impl MetricsSink for TracingMetrics {
    async fn build_started(&self, build_id: &BuildId) {
        tracing::info!(target: "kiln::metrics", %build_id, "build started");
    }

    async fn build_finished(&self, build_id: &BuildId, status: BuildStatus, duration: Duration) {
        tracing::info!(
            target: "kiln::metrics",
            %build_id,
            %status,
            duration_ms = duration.as_millis() as u64,
            "build finished"
        );
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::MetricsSink;
    use async_trait::async_trait;
    use kiln_core::{BuildId, BuildStatus};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// Recorded metrics call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MetricsCall {
        Started(BuildId),
        Finished(BuildId, BuildStatus),
    }

    /// Fake metrics sink for testing
    #[derive(Clone, Default)]
    pub struct FakeMetrics {
        calls: Arc<Mutex<Vec<MetricsCall>>>,
    }

    impl FakeMetrics {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<MetricsCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl MetricsSink for FakeMetrics {
        async fn build_started(&self, build_id: &BuildId) {
            self.calls.lock().push(MetricsCall::Started(build_id.clone()));
        }

        async fn build_finished(&self, build_id: &BuildId, status: BuildStatus, _duration: Duration) {
            self.calls.lock().push(MetricsCall::Finished(build_id.clone(), status));
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMetrics, MetricsCall};
