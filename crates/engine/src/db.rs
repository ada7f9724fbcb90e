// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease-guarded tracking on top of the registered engines.
//!
//! Any number of coordinators may call `resume` on the same build; the
//! tracking lock makes sure only one of them drives it at a time. Aborts
//! reach the driving coordinator through the build's abort notifier.

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineBuild, EngineRegistry};
use crate::error::EngineError;
use async_trait::async_trait;
use kiln_adapters::MetricsSink;
use kiln_core::{BuildStatus, Plan};
use kiln_storage::{BuildDb, TrackingLock};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

pub const DB_ENGINE_NAME: &str = "db";

pub struct DbEngine {
    engines: EngineRegistry,
    config: EngineConfig,
    metrics: Arc<dyn MetricsSink>,
    tracker: TaskTracker,
}

impl DbEngine {
    pub fn new(engines: EngineRegistry, config: EngineConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { engines, config, metrics, tracker: TaskTracker::new() }
    }

    fn tracked(&self, build: Arc<dyn BuildDb>) -> TrackedBuild {
        TrackedBuild {
            build,
            engines: self.engines.clone(),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
            tracker: self.tracker.clone(),
        }
    }
}

#[async_trait]
impl Engine for DbEngine {
    fn name(&self) -> &str {
        DB_ENGINE_NAME
    }

    /// Create the build on the primary engine, then persist it as started.
    ///
    /// If the build was aborted while still pending, `start` refuses and the
    /// freshly created engine build is aborted instead.
    async fn create_build(
        &self,
        build: Arc<dyn BuildDb>,
        plan: &Plan,
    ) -> Result<Arc<dyn EngineBuild>, EngineError> {
        let engine = self.engines.primary()?;
        let created = engine.create_build(Arc::clone(&build), plan).await?;

        let started = build.start(engine.name(), &created.metadata(), plan).await?;
        if !started {
            tracing::info!(build_id = %build.id(), "build aborted before start");
            if let Err(e) = created.abort().await {
                tracing::warn!(build_id = %build.id(), error = %e, "failed to abort unstarted build");
            }
        }

        Ok(Arc::new(self.tracked(build)))
    }

    async fn lookup_build(&self, build: Arc<dyn BuildDb>) -> Result<Arc<dyn EngineBuild>, EngineError> {
        Ok(Arc::new(self.tracked(build)))
    }

    /// Release every engine's builds, then wait for in-flight tracking to
    /// wind down.
    async fn release_all(&self) {
        tracing::info!("releasing all builds");
        for engine in self.engines.engines() {
            engine.release_all().await;
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// A build as seen through the store, tracked under a lease.
pub struct TrackedBuild {
    build: Arc<dyn BuildDb>,
    engines: EngineRegistry,
    config: EngineConfig,
    metrics: Arc<dyn MetricsSink>,
    tracker: TaskTracker,
}

impl TrackedBuild {
    async fn track(&self) {
        let lock = match self.build.acquire_tracking_lock(self.config.track_lock_duration).await {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                tracing::debug!("build tracked elsewhere");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to acquire tracking lock");
                return;
            }
        };

        self.track_locked(lock.as_ref()).await;

        if let Err(e) = lock.release().await {
            tracing::warn!(error = %e, "failed to release tracking lock");
        }
    }

    async fn track_locked(&self, lock: &dyn TrackingLock) {
        match self.build.reload().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("build no longer exists");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to reload build");
                return;
            }
        }
        if !self.build.is_running() {
            tracing::debug!(status = %self.build.status(), "build not running");
            return;
        }

        let engine_name = self.build.engine();
        if engine_name.is_empty() {
            tracing::debug!("build has no engine yet");
            return;
        }
        let Some(engine) = self.engines.get(&engine_name) else {
            tracing::error!(engine = %engine_name, "unknown build engine");
            self.finish_with_error(&format!("unknown build engine: {engine_name}")).await;
            return;
        };

        if let Err(e) = self.build.tracked_by(&self.config.tracker).await {
            tracing::error!(error = %e, "failed to record tracker");
            return;
        }

        let engine_build = match engine.lookup_build(Arc::clone(&self.build)).await {
            Ok(build) => build,
            Err(e) => {
                tracing::error!(engine = %engine_name, error = %e, "failed to look up engine build");
                self.finish_with_error(&format!("failed to look up engine build: {e}")).await;
                return;
            }
        };

        let mut notifier = match self.build.abort_notifier().await {
            Ok(notifier) => notifier,
            Err(e) => {
                tracing::error!(error = %e, "failed to subscribe to aborts");
                return;
            }
        };

        let build_id = self.build.id();
        self.metrics.build_started(build_id).await;
        let started = Instant::now();

        let every = self.config.renew_interval();
        let mut renew = tokio::time::interval_at(started + every, every);
        let mut resume = engine_build.resume();
        let mut abort_sent = false;
        let completed = loop {
            tokio::select! {
                () = &mut resume => break true,
                () = notifier.notified(), if !abort_sent => {
                    abort_sent = true;
                    tracing::info!("build marked aborted, interrupting");
                    if let Err(e) = engine_build.abort().await {
                        tracing::error!(error = %e, "failed to abort engine build");
                    }
                }
                _ = renew.tick() => {
                    if let Err(e) = lock.renew().await {
                        tracing::warn!(error = %e, "tracking lease lost, stopping");
                        break false;
                    }
                }
            }
        };
        drop(resume);
        drop(notifier);

        if completed {
            if let Err(e) = self.build.reload().await {
                tracing::warn!(error = %e, "failed to reload finished build");
            }
        }
        self.metrics.build_finished(build_id, self.build.status(), started.elapsed()).await;
    }

    async fn finish_with_error(&self, message: &str) {
        if let Err(e) = self.build.finish_with_error(message).await {
            tracing::error!(error = %e, "failed to finish build with error");
        }
    }

    async fn abort_locked(&self) -> Result<(), EngineError> {
        self.build.mark_as_aborted().await?;
        if !self.build.reload().await? {
            return Ok(());
        }

        let engine_name = self.build.engine();
        if engine_name.is_empty() {
            self.build.finish(BuildStatus::Aborted).await?;
            return Ok(());
        }
        let engine = self
            .engines
            .get(&engine_name)
            .ok_or_else(|| EngineError::UnknownEngine(engine_name.clone()))?;
        let engine_build = engine.lookup_build(Arc::clone(&self.build)).await?;
        engine_build.abort().await
    }
}

#[async_trait]
impl EngineBuild for TrackedBuild {
    fn metadata(&self) -> String {
        self.build.engine_metadata()
    }

    /// Mark the build aborted.
    ///
    /// When another coordinator holds the lease, marking is all that happens;
    /// that coordinator hears about it through its notifier. Otherwise a
    /// build without an engine finishes as aborted right away.
    async fn abort(&self) -> Result<(), EngineError> {
        let build_id = self.build.id();
        let Some(lock) = self.build.acquire_tracking_lock(self.config.track_lock_duration).await? else {
            tracing::info!(%build_id, "marking build aborted for its tracker");
            self.build.mark_as_aborted().await?;
            return Ok(());
        };

        let result = self.abort_locked().await;
        if let Err(e) = lock.release().await {
            tracing::warn!(%build_id, error = %e, "failed to release tracking lock");
        }
        result
    }

    async fn resume(&self) {
        let span = tracing::info_span!("track", build_id = %self.build.id());
        self.tracker.track_future(self.track()).instrument(span).await;
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
