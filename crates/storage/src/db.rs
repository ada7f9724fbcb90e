// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence contract the engine tracks builds through.

use crate::error::StoreError;
use crate::notifier::AbortNotifier;
use async_trait::async_trait;
use kiln_core::{BuildId, BuildStatus, Event, Plan, VersionedResource};
use std::time::Duration;

/// Handle on one persisted build.
///
/// The synchronous accessors report the values seen by the most recent
/// `reload` (or `start`) through this handle.
#[async_trait]
pub trait BuildDb: Send + Sync {
    fn id(&self) -> &BuildId;

    /// Move the build from pending to started, attaching the engine that
    /// will track it. Returns `false` if the build was already started or
    /// has been marked aborted.
    async fn start(&self, engine: &str, metadata: &str, plan: &Plan) -> Result<bool, StoreError>;

    /// Refresh cached attributes. Returns `false` if the build is gone.
    async fn reload(&self) -> Result<bool, StoreError>;

    /// Set the durable aborted flag and wake every [`AbortNotifier`].
    async fn mark_as_aborted(&self) -> Result<(), StoreError>;

    /// Set the terminal status. Only the first call takes effect.
    async fn finish(&self, status: BuildStatus) -> Result<(), StoreError>;

    /// Record an error event and finish as errored.
    async fn finish_with_error(&self, message: &str) -> Result<(), StoreError>;

    async fn save_event(&self, event: &Event) -> Result<(), StoreError>;

    async fn save_input(&self, input: &VersionedResource) -> Result<(), StoreError>;

    async fn save_output(&self, output: &VersionedResource, explicit: bool) -> Result<(), StoreError>;

    /// Try to claim the build's tracking lease. `Ok(None)` means another
    /// holder has a live lease.
    async fn acquire_tracking_lock(
        &self,
        lease: Duration,
    ) -> Result<Option<Box<dyn TrackingLock>>, StoreError>;

    async fn abort_notifier(&self) -> Result<AbortNotifier, StoreError>;

    /// Record which tracker is running the build.
    async fn tracked_by(&self, tracker: &str) -> Result<(), StoreError>;

    fn is_running(&self) -> bool;

    fn engine(&self) -> String;

    fn engine_metadata(&self) -> String;

    fn status(&self) -> BuildStatus;

    fn aborted(&self) -> bool;
}

/// A held tracking lease.
#[async_trait]
pub trait TrackingLock: Send + Sync {
    /// Push the expiry out by another lease duration. Fails with
    /// [`StoreError::LeaseLost`] once the lease has expired or been taken.
    async fn renew(&self) -> Result<(), StoreError>;

    async fn release(&self) -> Result<(), StoreError>;
}
