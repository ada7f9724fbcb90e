// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory [`BuildDb`] for engine tests.

use crate::db::{BuildDb, TrackingLock};
use crate::error::StoreError;
use crate::notifier::AbortNotifier;
use async_trait::async_trait;
use kiln_core::{BuildId, BuildStatus, Event, Plan, VersionedResource};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum DbCall {
    Start { engine: String, metadata: String },
    Reload,
    MarkAsAborted,
    Finish(BuildStatus),
    FinishWithError(String),
    SaveEvent(Event),
    SaveInput(VersionedResource),
    SaveOutput { output: VersionedResource, explicit: bool },
    AcquireTrackingLock(Duration),
    RenewLock,
    ReleaseLock,
    AbortNotifier,
    TrackedBy(String),
}

/// Outcome of `acquire_tracking_lock`
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LockScript {
    #[default]
    Acquire,
    Held,
    Fail(String),
}

struct FakeDbState {
    calls: Vec<DbCall>,
    start_result: Result<bool, String>,
    reload_result: Result<bool, String>,
    lock: LockScript,
    renew_fails: bool,
    notifier_error: Option<String>,
    tracked_by_error: Option<String>,
    save_event_error: Option<String>,
    engine: String,
    engine_metadata: String,
    status: BuildStatus,
    aborted: bool,
}

/// Fake build handle for testing.
///
/// Clones share state, so a test keeps one clone for assertions and hands
/// another to the engine.
#[derive(Clone)]
pub struct FakeBuildDb {
    id: BuildId,
    inner: Arc<Mutex<FakeDbState>>,
    abort_tx: Arc<watch::Sender<bool>>,
}

impl Default for FakeBuildDb {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBuildDb {
    pub fn new() -> Self {
        Self {
            id: BuildId::new(),
            inner: Arc::new(Mutex::new(FakeDbState {
                calls: Vec::new(),
                start_result: Ok(true),
                reload_result: Ok(true),
                lock: LockScript::Acquire,
                renew_fails: false,
                notifier_error: None,
                tracked_by_error: None,
                save_event_error: None,
                engine: String::new(),
                engine_metadata: String::new(),
                status: BuildStatus::Pending,
                aborted: false,
            })),
            abort_tx: Arc::new(watch::channel(false).0),
        }
    }

    /// A build already started on `engine` with `metadata`.
    pub fn started(engine: &str, metadata: &str) -> Self {
        let fake = Self::new();
        {
            let mut inner = fake.inner.lock();
            inner.engine = engine.to_string();
            inner.engine_metadata = metadata.to_string();
            inner.status = BuildStatus::Started;
        }
        fake
    }

    pub fn set_start_result(&self, result: Result<bool, &str>) {
        self.inner.lock().start_result = result.map_err(str::to_string);
    }

    pub fn set_reload_result(&self, result: Result<bool, &str>) {
        self.inner.lock().reload_result = result.map_err(str::to_string);
    }

    pub fn set_lock(&self, lock: LockScript) {
        self.inner.lock().lock = lock;
    }

    pub fn set_renew_fails(&self, fails: bool) {
        self.inner.lock().renew_fails = fails;
    }

    pub fn set_notifier_error(&self, message: &str) {
        self.inner.lock().notifier_error = Some(message.to_string());
    }

    pub fn set_tracked_by_error(&self, message: &str) {
        self.inner.lock().tracked_by_error = Some(message.to_string());
    }

    pub fn set_save_event_error(&self, message: &str) {
        self.inner.lock().save_event_error = Some(message.to_string());
    }

    pub fn set_engine(&self, engine: &str, metadata: &str) {
        let mut inner = self.inner.lock();
        inner.engine = engine.to_string();
        inner.engine_metadata = metadata.to_string();
    }

    pub fn set_status(&self, status: BuildStatus) {
        self.inner.lock().status = status;
    }

    /// Simulate another process marking the build aborted.
    pub fn fire_abort(&self) {
        self.inner.lock().aborted = true;
        self.abort_tx.send_replace(true);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DbCall> {
        self.inner.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&DbCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DbCall::SaveEvent(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Statuses passed to `finish`, in order
    pub fn finishes(&self) -> Vec<BuildStatus> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DbCall::Finish(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn outputs(&self) -> Vec<(VersionedResource, bool)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DbCall::SaveOutput { output, explicit } => Some((output.clone(), *explicit)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DbCall) {
        self.inner.lock().calls.push(call);
    }
}

fn unavailable(message: &str) -> StoreError {
    StoreError::Unavailable(message.to_string())
}

#[async_trait]
impl BuildDb for FakeBuildDb {
    fn id(&self) -> &BuildId {
        &self.id
    }

    async fn start(&self, engine: &str, metadata: &str, _plan: &Plan) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::Start { engine: engine.to_string(), metadata: metadata.to_string() });
        let started = inner.start_result.clone().map_err(|e| unavailable(&e))?;
        if started {
            inner.engine = engine.to_string();
            inner.engine_metadata = metadata.to_string();
            inner.status = BuildStatus::Started;
        }
        Ok(started)
    }

    async fn reload(&self) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::Reload);
        inner.reload_result.clone().map_err(|e| unavailable(&e))
    }

    async fn mark_as_aborted(&self) -> Result<(), StoreError> {
        self.record(DbCall::MarkAsAborted);
        self.inner.lock().aborted = true;
        self.abort_tx.send_replace(true);
        Ok(())
    }

    async fn finish(&self, status: BuildStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::Finish(status));
        inner.status = status;
        Ok(())
    }

    async fn finish_with_error(&self, message: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::FinishWithError(message.to_string()));
        inner.status = BuildStatus::Errored;
        Ok(())
    }

    async fn save_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::SaveEvent(event.clone()));
        match &inner.save_event_error {
            Some(e) => Err(unavailable(e)),
            None => Ok(()),
        }
    }

    async fn save_input(&self, input: &VersionedResource) -> Result<(), StoreError> {
        self.record(DbCall::SaveInput(input.clone()));
        Ok(())
    }

    async fn save_output(&self, output: &VersionedResource, explicit: bool) -> Result<(), StoreError> {
        self.record(DbCall::SaveOutput { output: output.clone(), explicit });
        Ok(())
    }

    async fn acquire_tracking_lock(
        &self,
        lease: Duration,
    ) -> Result<Option<Box<dyn TrackingLock>>, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::AcquireTrackingLock(lease));
        match &inner.lock {
            LockScript::Acquire => Ok(Some(Box::new(FakeLock { db: self.clone() }))),
            LockScript::Held => Ok(None),
            LockScript::Fail(e) => Err(unavailable(e)),
        }
    }

    async fn abort_notifier(&self) -> Result<AbortNotifier, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::AbortNotifier);
        match &inner.notifier_error {
            Some(e) => Err(unavailable(e)),
            None => Ok(AbortNotifier::new(self.abort_tx.subscribe())),
        }
    }

    async fn tracked_by(&self, tracker: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DbCall::TrackedBy(tracker.to_string()));
        match &inner.tracked_by_error {
            Some(e) => Err(unavailable(e)),
            None => Ok(()),
        }
    }

    fn is_running(&self) -> bool {
        !self.inner.lock().status.is_terminal()
    }

    fn engine(&self) -> String {
        self.inner.lock().engine.clone()
    }

    fn engine_metadata(&self) -> String {
        self.inner.lock().engine_metadata.clone()
    }

    fn status(&self) -> BuildStatus {
        self.inner.lock().status
    }

    fn aborted(&self) -> bool {
        self.inner.lock().aborted
    }
}

struct FakeLock {
    db: FakeBuildDb,
}

#[async_trait]
impl TrackingLock for FakeLock {
    async fn renew(&self) -> Result<(), StoreError> {
        let mut inner = self.db.inner.lock();
        inner.calls.push(DbCall::RenewLock);
        if inner.renew_fails {
            return Err(StoreError::LeaseLost(self.db.id.clone()));
        }
        Ok(())
    }

    async fn release(&self) -> Result<(), StoreError> {
        self.db.record(DbCall::ReleaseLock);
        Ok(())
    }
}
