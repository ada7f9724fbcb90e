// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store-backed [`BuildDb`] implementation.

use crate::db::{BuildDb, TrackingLock};
use crate::error::StoreError;
use crate::lease::{LeaseTable, StoreLease};
use crate::notifier::AbortNotifier;
use crate::state::{BuildRow, MaterializedState, SavedOutput, StoreOp};
use crate::wal::Wal;
use async_trait::async_trait;
use kiln_core::{
    BuildId, BuildStatus, Clock, Event, EventEnvelope, Plan, SystemClock, VersionedResource,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

struct StoreInner {
    state: MaterializedState,
    wal: Option<Wal>,
    leases: LeaseTable,
    aborts: HashMap<BuildId, watch::Sender<bool>>,
}

impl StoreInner {
    /// Persist then apply. Ops the state would ignore are not written.
    fn commit(&mut self, op: StoreOp) -> Result<bool, StoreError> {
        if !self.state.accepts(&op) {
            return Ok(false);
        }
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&op)?;
            wal.flush()?;
        }
        self.state.apply(&op);
        Ok(true)
    }

    fn row(&self, id: &BuildId) -> Result<&BuildRow, StoreError> {
        self.state.build(id).ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// Shared build store. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct BuildStore<C: Clock = SystemClock> {
    inner: Arc<Mutex<StoreInner>>,
    clock: C,
}

impl<C: Clock> BuildStore<C> {
    pub fn in_memory(clock: C) -> Self {
        Self::with_state(MaterializedState::default(), None, clock)
    }

    /// Open a durable store, replaying every entry of the WAL at `path`.
    pub fn open(path: &Path, clock: C) -> Result<Self, StoreError> {
        let wal = Wal::open(path)?;
        let mut state = MaterializedState::default();
        let entries = wal.entries_after(0)?;
        for entry in &entries {
            state.apply(&entry.op);
        }
        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            builds = state.builds.len(),
            "replayed build wal"
        );
        Ok(Self::with_state(state, Some(wal), clock))
    }

    fn with_state(state: MaterializedState, wal: Option<Wal>, clock: C) -> Self {
        let inner = StoreInner { state, wal, leases: LeaseTable::default(), aborts: HashMap::new() };
        Self { inner: Arc::new(Mutex::new(inner)), clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Create a pending build.
    pub fn create_build(&self, job: Option<&str>) -> Result<StoredBuild<C>, StoreError> {
        let id = BuildId::new();
        let op = StoreOp::BuildCreated {
            id: id.clone(),
            job: job.map(str::to_string),
            created_at_ms: self.clock.epoch_ms(),
        };
        let row = {
            let mut inner = self.inner.lock();
            inner.commit(op)?;
            inner.row(&id)?.clone()
        };
        tracing::debug!(build_id = %id, "build created");
        Ok(StoredBuild { store: self.clone(), id, row: Mutex::new(row) })
    }

    /// Open a handle on an existing build.
    pub fn build(&self, id: &BuildId) -> Result<StoredBuild<C>, StoreError> {
        let row = self.snapshot(id)?;
        Ok(StoredBuild { store: self.clone(), id: id.clone(), row: Mutex::new(row) })
    }

    pub fn snapshot(&self, id: &BuildId) -> Result<BuildRow, StoreError> {
        self.inner.lock().row(id).cloned()
    }

    pub fn build_ids(&self) -> Vec<BuildId> {
        let mut ids: Vec<BuildId> = self.inner.lock().state.builds.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn events(&self, id: &BuildId) -> Vec<EventEnvelope> {
        self.inner.lock().state.events.get(id).cloned().unwrap_or_default()
    }

    /// Events decoded back into typed values; undecodable entries are skipped.
    pub fn decoded_events(&self, id: &BuildId) -> Vec<Event> {
        self.events(id).iter().filter_map(|e| e.decode().ok()).collect()
    }

    pub fn inputs(&self, id: &BuildId) -> Vec<VersionedResource> {
        self.inner.lock().state.inputs.get(id).cloned().unwrap_or_default()
    }

    pub fn outputs(&self, id: &BuildId) -> Vec<SavedOutput> {
        self.inner.lock().state.outputs.get(id).cloned().unwrap_or_default()
    }

    /// Current lease holder token and expiry, for diagnostics.
    pub fn lease_expiry_ms(&self, id: &BuildId) -> Option<u64> {
        self.inner.lock().leases.get(id).map(|l| l.expires_at_ms)
    }

    pub(crate) fn renew_lease(&self, id: &BuildId, token: Uuid, duration: Duration) -> bool {
        let now = self.clock.epoch_ms();
        self.inner.lock().leases.renew(id, token, now, duration)
    }

    pub(crate) fn release_lease(&self, id: &BuildId, token: Uuid) -> bool {
        self.inner.lock().leases.release(id, token)
    }

    fn commit(&self, op: StoreOp) -> Result<bool, StoreError> {
        self.inner.lock().commit(op)
    }

    fn finish(&self, id: &BuildId, status: BuildStatus) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let finish = StoreOp::BuildFinished {
            id: id.clone(),
            status,
            finished_at_ms: self.clock.epoch_ms(),
        };
        if !status.is_terminal() || !inner.state.accepts(&finish) {
            return Ok(false);
        }
        let event = Event::Status { status, time: self.clock.epoch_secs() };
        inner.commit(StoreOp::EventSaved { id: id.clone(), event: EventEnvelope::encode(&event)? })?;
        let finished = inner.commit(finish)?;
        if finished {
            // Live subscribers keep waiting; a finished build is never aborted
            inner.aborts.remove(id);
        }
        Ok(finished)
    }
}

/// Handle on one build in a [`BuildStore`].
pub struct StoredBuild<C: Clock = SystemClock> {
    store: BuildStore<C>,
    id: BuildId,
    row: Mutex<BuildRow>,
}

impl<C: Clock> StoredBuild<C> {
    pub fn store(&self) -> &BuildStore<C> {
        &self.store
    }

    /// Cached row as of the last reload.
    pub fn row(&self) -> BuildRow {
        self.row.lock().clone()
    }

    fn refresh(&self) -> Result<bool, StoreError> {
        match self.store.inner.lock().state.build(&self.id) {
            Some(row) => {
                *self.row.lock() = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl<C: Clock> BuildDb for StoredBuild<C> {
    fn id(&self) -> &BuildId {
        &self.id
    }

    async fn start(&self, engine: &str, metadata: &str, plan: &Plan) -> Result<bool, StoreError> {
        let started = self.store.commit(StoreOp::BuildStarted {
            id: self.id.clone(),
            engine: engine.to_string(),
            metadata: metadata.to_string(),
            plan: serde_json::to_value(plan)?,
            started_at_ms: self.store.clock.epoch_ms(),
        })?;
        if started {
            let event = Event::Status {
                status: BuildStatus::Started,
                time: self.store.clock.epoch_secs(),
            };
            self.save_event(&event).await?;
        }
        self.refresh()?;
        Ok(started)
    }

    async fn reload(&self) -> Result<bool, StoreError> {
        self.refresh()
    }

    async fn mark_as_aborted(&self) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock();
        inner.row(&self.id)?;
        inner.commit(StoreOp::BuildMarkedAborted { id: self.id.clone() })?;
        if let Some(tx) = inner.aborts.get(&self.id) {
            tx.send_replace(true);
        }
        Ok(())
    }

    async fn finish(&self, status: BuildStatus) -> Result<(), StoreError> {
        if !self.store.finish(&self.id, status)? {
            tracing::debug!(build_id = %self.id, %status, "build already finished");
        }
        self.refresh()?;
        Ok(())
    }

    async fn finish_with_error(&self, message: &str) -> Result<(), StoreError> {
        self.save_event(&Event::Error { origin: None, message: message.to_string() }).await?;
        self.finish(BuildStatus::Errored).await
    }

    async fn save_event(&self, event: &Event) -> Result<(), StoreError> {
        let event = EventEnvelope::encode(event)?;
        self.store.commit(StoreOp::EventSaved { id: self.id.clone(), event })?;
        Ok(())
    }

    async fn save_input(&self, input: &VersionedResource) -> Result<(), StoreError> {
        self.store.commit(StoreOp::InputSaved { id: self.id.clone(), input: input.clone() })?;
        Ok(())
    }

    async fn save_output(&self, output: &VersionedResource, explicit: bool) -> Result<(), StoreError> {
        self.store.commit(StoreOp::OutputSaved {
            id: self.id.clone(),
            output: output.clone(),
            explicit,
        })?;
        Ok(())
    }

    async fn acquire_tracking_lock(
        &self,
        lease: Duration,
    ) -> Result<Option<Box<dyn TrackingLock>>, StoreError> {
        let now = self.store.clock.epoch_ms();
        let token = {
            let mut inner = self.store.inner.lock();
            inner.row(&self.id)?;
            inner.leases.claim(&self.id, now, lease)
        };
        Ok(token.map(|token| {
            Box::new(StoreLease {
                store: self.store.clone(),
                id: self.id.clone(),
                token,
                duration: lease,
            }) as Box<dyn TrackingLock>
        }))
    }

    async fn abort_notifier(&self) -> Result<AbortNotifier, StoreError> {
        let mut inner = self.store.inner.lock();
        let row = inner.row(&self.id)?;
        let aborted = row.aborted;
        if row.status.is_terminal() {
            return Ok(AbortNotifier::new(watch::channel(aborted).1));
        }
        let tx = inner.aborts.entry(self.id.clone()).or_insert_with(|| watch::channel(aborted).0);
        Ok(AbortNotifier::new(tx.subscribe()))
    }

    async fn tracked_by(&self, tracker: &str) -> Result<(), StoreError> {
        self.store.commit(StoreOp::BuildTracked { id: self.id.clone(), tracker: tracker.to_string() })?;
        Ok(())
    }

    fn is_running(&self) -> bool {
        !self.row.lock().status.is_terminal()
    }

    fn engine(&self) -> String {
        self.row.lock().engine.clone()
    }

    fn engine_metadata(&self) -> String {
        self.row.lock().engine_metadata.clone()
    }

    fn status(&self) -> BuildStatus {
        self.row.lock().status
    }

    fn aborted(&self) -> bool {
        self.row.lock().aborted
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
