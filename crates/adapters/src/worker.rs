// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task, get and put primitives run by the worker runtime.

use async_trait::async_trait;
use kiln_core::{BuildId, GetPlan, PlanId, PutPlan, TaskPlan, VersionInfo};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from worker operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("worker unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

/// Where a step runs, for container naming and log correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub build_id: BuildId,
    pub origin: PlanId,
    pub name: String,
    /// 1-based attempt numbers of the enclosing retries, outermost first
    pub attempts: Vec<u32>,
}

impl StepContext {
    pub fn new(build_id: BuildId, origin: PlanId, name: impl Into<String>) -> Self {
        Self { build_id, origin, name: name.into(), attempts: Vec::new() }
    }

    pub fn with_attempts(mut self, attempts: Vec<u32>) -> Self {
        self.attempts = attempts;
        self
    }

    /// `build-<id>-<name>`, suffixed with `-attempt-<n>[.<m>...]` inside retries.
    pub fn session_name(&self) -> String {
        let mut name = format!("build-{}-{}", self.build_id.short(8), self.name);
        if !self.attempts.is_empty() {
            let attempts: Vec<String> = self.attempts.iter().map(u32::to_string).collect();
            let _ = write!(name, "-attempt-{}", attempts.join("."));
        }
        name
    }
}

/// Receives raw output bytes from a running step.
///
/// Chunks may split multi-byte characters; sinks reassemble them.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(&self, bytes: &[u8]);
}

/// Discards output
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl LogSink for NullSink {
    async fn write(&self, _bytes: &[u8]) {}
}

/// Output streams handed to the worker for one step.
#[derive(Clone)]
pub struct StepIo {
    pub stdout: Arc<dyn LogSink>,
    pub stderr: Arc<dyn LogSink>,
}

impl StepIo {
    pub fn new(stdout: Arc<dyn LogSink>, stderr: Arc<dyn LogSink>) -> Self {
        Self { stdout, stderr }
    }

    pub fn discard() -> Self {
        Self { stdout: Arc::new(NullSink), stderr: Arc::new(NullSink) }
    }
}

/// Outcome of a get or put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceResult {
    pub exit_status: i32,
    pub info: VersionInfo,
}

impl ResourceResult {
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }
}

/// The container runtime.
///
/// A returned exit status, zero or not, means the primitive ran to
/// completion. `Err` means it could not run at all. Implementations should
/// stop work promptly once `cancel` fires; callers stop waiting regardless.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    async fn run_task(
        &self,
        ctx: &StepContext,
        plan: &TaskPlan,
        io: StepIo,
        cancel: CancellationToken,
    ) -> Result<i32, WorkerError>;

    /// Fetch a resource, at `plan.version` when pinned.
    async fn fetch(
        &self,
        ctx: &StepContext,
        plan: &GetPlan,
        io: StepIo,
        cancel: CancellationToken,
    ) -> Result<ResourceResult, WorkerError>;

    async fn push(
        &self,
        ctx: &StepContext,
        plan: &PutPlan,
        io: StepIo,
        cancel: CancellationToken,
    ) -> Result<ResourceResult, WorkerError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ResourceResult, StepContext, StepIo, Worker, WorkerError};
    use async_trait::async_trait;
    use kiln_core::{GetPlan, PutPlan, TaskPlan, Version, VersionInfo};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum WorkerCallKind {
        Task,
        Get,
        Put,
    }

    /// Recorded worker call
    #[derive(Debug, Clone, PartialEq)]
    pub struct WorkerCall {
        pub kind: WorkerCallKind,
        pub name: String,
        pub session: String,
        /// Pinned version for gets
        pub version: Option<Version>,
    }

    #[derive(Debug, Clone)]
    enum Outcome {
        Exit(i32),
        Error(WorkerError),
        /// Block until cancelled
        Hang,
    }

    /// Scripted behavior for one step name.
    #[derive(Debug, Clone)]
    pub struct Script {
        outcome: Outcome,
        delay: Option<Duration>,
        version: Option<Version>,
        stdout: Vec<u8>,
    }

    impl Script {
        pub fn exit(status: i32) -> Self {
            Self { outcome: Outcome::Exit(status), delay: None, version: None, stdout: Vec::new() }
        }

        pub fn error(message: &str) -> Self {
            Self {
                outcome: Outcome::Error(WorkerError::Unavailable(message.to_string())),
                ..Self::exit(0)
            }
        }

        pub fn hang() -> Self {
            Self { outcome: Outcome::Hang, ..Self::exit(0) }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn with_version(mut self, version: Version) -> Self {
            self.version = Some(version);
            self
        }

        pub fn with_stdout(mut self, bytes: &[u8]) -> Self {
            self.stdout = bytes.to_vec();
            self
        }
    }

    struct FakeWorkerState {
        scripts: HashMap<String, Script>,
        calls: Vec<WorkerCall>,
    }

    /// Fake worker for testing.
    ///
    /// Unscripted steps exit 0; gets and puts report version
    /// `{"ref": "<name>"}` unless scripted otherwise.
    #[derive(Clone)]
    pub struct FakeWorker {
        inner: Arc<Mutex<FakeWorkerState>>,
    }

    impl Default for FakeWorker {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeWorkerState {
                    scripts: HashMap::new(),
                    calls: Vec::new(),
                })),
            }
        }
    }

    impl FakeWorker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the step named `name` (task name or get/put step name).
        pub fn script(&self, name: &str, script: Script) -> &Self {
            self.inner.lock().scripts.insert(name.to_string(), script);
            self
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<WorkerCall> {
            self.inner.lock().calls.clone()
        }

        pub fn call_names(&self) -> Vec<String> {
            self.inner.lock().calls.iter().map(|c| c.name.clone()).collect()
        }

        /// Wait until a call for `name` has been recorded.
        pub async fn started(&self, name: &str) {
            loop {
                let seen = self.inner.lock().calls.iter().any(|c| c.name == name);
                if seen {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }

        async fn invoke(
            &self,
            kind: WorkerCallKind,
            ctx: &StepContext,
            version: Option<Version>,
            io: &StepIo,
            cancel: &CancellationToken,
        ) -> Result<(i32, Option<Version>), WorkerError> {
            let script = {
                let mut inner = self.inner.lock();
                inner.calls.push(WorkerCall {
                    kind,
                    name: ctx.name.clone(),
                    session: ctx.session_name(),
                    version,
                });
                inner.scripts.get(&ctx.name).cloned().unwrap_or_else(|| Script::exit(0))
            };
            if !script.stdout.is_empty() {
                io.stdout.write(&script.stdout).await;
            }
            if let Some(delay) = script.delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Ok((137, None)),
                }
            }
            match script.outcome {
                Outcome::Exit(status) => Ok((status, script.version)),
                Outcome::Error(e) => Err(e),
                Outcome::Hang => {
                    cancel.cancelled().await;
                    Ok((137, None))
                }
            }
        }

        fn resource(name: &str, status: i32, version: Option<Version>) -> ResourceResult {
            let version = version.unwrap_or_else(|| kiln_core::version([("ref", name)]));
            ResourceResult { exit_status: status, info: VersionInfo::new(version) }
        }
    }

    #[async_trait]
    impl Worker for FakeWorker {
        async fn run_task(
            &self,
            ctx: &StepContext,
            _plan: &TaskPlan,
            io: StepIo,
            cancel: CancellationToken,
        ) -> Result<i32, WorkerError> {
            let (status, _) = self.invoke(WorkerCallKind::Task, ctx, None, &io, &cancel).await?;
            Ok(status)
        }

        async fn fetch(
            &self,
            ctx: &StepContext,
            plan: &GetPlan,
            io: StepIo,
            cancel: CancellationToken,
        ) -> Result<ResourceResult, WorkerError> {
            let (status, scripted) =
                self.invoke(WorkerCallKind::Get, ctx, plan.version.clone(), &io, &cancel).await?;
            Ok(Self::resource(&ctx.name, status, scripted.or_else(|| plan.version.clone())))
        }

        async fn push(
            &self,
            ctx: &StepContext,
            _plan: &PutPlan,
            io: StepIo,
            cancel: CancellationToken,
        ) -> Result<ResourceResult, WorkerError> {
            let (status, scripted) =
                self.invoke(WorkerCallKind::Put, ctx, None, &io, &cancel).await?;
            Ok(Self::resource(&ctx.name, status, scripted))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWorker, Script, WorkerCall, WorkerCallKind};

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
