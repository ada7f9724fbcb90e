// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine abstraction and the registry engines are selected from.

use crate::error::EngineError;
use async_trait::async_trait;
use kiln_core::Plan;
use kiln_storage::BuildDb;
use std::sync::Arc;

/// Runs builds.
///
/// An engine compiles a plan into an [`EngineBuild`] and can rebuild that
/// handle later from the build's persisted engine metadata alone.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Persisted as the build's engine name; must be stable across releases.
    fn name(&self) -> &str;

    async fn create_build(
        &self,
        build: Arc<dyn BuildDb>,
        plan: &Plan,
    ) -> Result<Arc<dyn EngineBuild>, EngineError>;

    /// Rebuild the handle of a build this engine created earlier.
    async fn lookup_build(&self, build: Arc<dyn BuildDb>) -> Result<Arc<dyn EngineBuild>, EngineError>;

    /// Stop driving every build without finishing them, so another tracker
    /// can pick them up.
    async fn release_all(&self);
}

/// Handle on one build of an [`Engine`].
#[async_trait]
pub trait EngineBuild: Send + Sync {
    /// Serialized form that `lookup_build` accepts.
    fn metadata(&self) -> String;

    /// Request interruption. Idempotent; returns once the request is
    /// delivered, not once the build stopped.
    async fn abort(&self) -> Result<(), EngineError>;

    /// Drive the build until it finishes, is released, or tracking stops.
    async fn resume(&self);
}

/// Engines by name. The first registered engine creates new builds.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, engine: Arc<dyn Engine>) -> Self {
        self.register(engine);
        self
    }

    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        self.engines.push(engine);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Engine>> {
        self.engines.iter().find(|e| e.name() == name)
    }

    pub fn primary(&self) -> Result<&Arc<dyn Engine>, EngineError> {
        self.engines.first().ok_or(EngineError::NoEngines)
    }

    pub fn engines(&self) -> &[Arc<dyn Engine>] {
        &self.engines
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Engine, EngineBuild};
    use crate::error::EngineError;
    use async_trait::async_trait;
    use kiln_core::Plan;
    use kiln_storage::BuildDb;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Recorded engine or engine-build call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum EngineCall {
        CreateBuild,
        LookupBuild { metadata: String },
        ReleaseAll,
        Abort,
        Resume,
    }

    #[derive(Default)]
    struct FakeEngineState {
        calls: Vec<EngineCall>,
        create_error: Option<String>,
        lookup_error: Option<String>,
        abort_error: Option<String>,
        /// `resume` blocks until [`FakeEngine::finish_resume`]
        resume_blocks: bool,
    }

    /// Fake engine for testing.
    ///
    /// Builds share the engine's call log. `resume` returns at once unless
    /// told to block.
    #[derive(Clone)]
    pub struct FakeEngine {
        name: String,
        inner: Arc<Mutex<FakeEngineState>>,
        resumed: Arc<Notify>,
        release_resume: Arc<Notify>,
    }

    impl FakeEngine {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                inner: Arc::default(),
                resumed: Arc::new(Notify::new()),
                release_resume: Arc::new(Notify::new()),
            }
        }

        pub fn set_create_error(&self, message: &str) {
            self.inner.lock().create_error = Some(message.to_string());
        }

        pub fn set_lookup_error(&self, message: &str) {
            self.inner.lock().lookup_error = Some(message.to_string());
        }

        pub fn set_abort_error(&self, message: &str) {
            self.inner.lock().abort_error = Some(message.to_string());
        }

        pub fn set_resume_blocks(&self, blocks: bool) {
            self.inner.lock().resume_blocks = blocks;
        }

        /// Wait until some build's `resume` has been entered.
        pub async fn resumed(&self) {
            self.resumed.notified().await;
        }

        /// Let a blocked `resume` return.
        pub fn finish_resume(&self) {
            self.release_resume.notify_one();
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<EngineCall> {
            self.inner.lock().calls.clone()
        }

        fn record(&self, call: EngineCall) {
            self.inner.lock().calls.push(call);
        }

        fn build(&self, metadata: String) -> Arc<dyn EngineBuild> {
            Arc::new(FakeEngineBuild { engine: self.clone(), metadata })
        }
    }

    fn failure(message: &str) -> EngineError {
        EngineError::Store(kiln_storage::StoreError::Unavailable(message.to_string()))
    }

    #[async_trait]
    impl Engine for FakeEngine {
        fn name(&self) -> &str {
            &self.name
        }

        async fn create_build(
            &self,
            _build: Arc<dyn BuildDb>,
            _plan: &Plan,
        ) -> Result<Arc<dyn EngineBuild>, EngineError> {
            self.record(EngineCall::CreateBuild);
            if let Some(e) = self.inner.lock().create_error.clone() {
                return Err(failure(&e));
            }
            Ok(self.build("{\"fake\":true}".to_string()))
        }

        async fn lookup_build(&self, build: Arc<dyn BuildDb>) -> Result<Arc<dyn EngineBuild>, EngineError> {
            let metadata = build.engine_metadata();
            self.record(EngineCall::LookupBuild { metadata: metadata.clone() });
            if let Some(e) = self.inner.lock().lookup_error.clone() {
                return Err(failure(&e));
            }
            Ok(self.build(metadata))
        }

        async fn release_all(&self) {
            self.record(EngineCall::ReleaseAll);
        }
    }

    struct FakeEngineBuild {
        engine: FakeEngine,
        metadata: String,
    }

    #[async_trait]
    impl EngineBuild for FakeEngineBuild {
        fn metadata(&self) -> String {
            self.metadata.clone()
        }

        async fn abort(&self) -> Result<(), EngineError> {
            self.engine.record(EngineCall::Abort);
            match self.engine.inner.lock().abort_error.clone() {
                Some(e) => Err(failure(&e)),
                None => Ok(()),
            }
        }

        async fn resume(&self) {
            self.engine.record(EngineCall::Resume);
            self.engine.resumed.notify_one();
            let blocks = self.engine.inner.lock().resume_blocks;
            if blocks {
                self.engine.release_resume.notified().await;
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{EngineCall, FakeEngine};

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
