//! Shared world for specs: one store, one worker, any number of coordinators.

pub use kiln_adapters::{FakeMetrics, FakeWorker, MetricsCall, Script};
pub use kiln_core::test_support::Plans;
pub use kiln_core::{BuildId, BuildStatus, Event, FakeClock, Plan};
pub use kiln_engine::{DbEngine, Engine, EngineBuild, EngineConfig, EngineRegistry, ExecEngine};
pub use kiln_storage::{BuildDb, BuildStore};
pub use std::sync::Arc;
pub use std::time::Duration;

/// Upper bound for anything a spec waits on.
pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(5);

pub struct World {
    pub store: BuildStore<FakeClock>,
    pub worker: FakeWorker,
    pub metrics: FakeMetrics,
    pub clock: FakeClock,
}

impl World {
    pub fn new() -> Self {
        Self::with_store(BuildStore::in_memory(FakeClock::new()))
    }

    pub fn with_store(store: BuildStore<FakeClock>) -> Self {
        let clock = store.clock().clone();
        Self { store, worker: FakeWorker::new(), metrics: FakeMetrics::new(), clock }
    }

    /// A fresh coordinator: its own engines, same store and worker.
    pub fn coordinator(&self, name: &str) -> Arc<DbEngine> {
        let exec = ExecEngine::with_clock(Arc::new(self.worker.clone()), self.clock.clone());
        let registry = EngineRegistry::new().with(Arc::new(exec));
        let config = EngineConfig::default().tracker(name);
        Arc::new(DbEngine::new(registry, config, Arc::new(self.metrics.clone())))
    }

    /// Persist a new build and start it on `coordinator`, without running it.
    pub async fn submit(&self, coordinator: &DbEngine, plan: &Plan) -> (BuildId, Arc<dyn EngineBuild>) {
        let build = self.store.create_build(Some("spec")).unwrap();
        let id = build.id().clone();
        let handle = coordinator.create_build(Arc::new(build), plan).await.unwrap();
        (id, handle)
    }

    /// Submit and run a build to completion on a single coordinator.
    pub async fn run(&self, plan: &Plan) -> BuildId {
        let coordinator = self.coordinator("local");
        let (id, build) = self.submit(&coordinator, plan).await;
        tokio::time::timeout(SPEC_WAIT_MAX, build.resume()).await.unwrap();
        id
    }

    /// A second, independent handle on a stored build.
    pub async fn handle(&self, coordinator: &DbEngine, id: &BuildId) -> Arc<dyn EngineBuild> {
        let build = self.store.build(id).unwrap();
        coordinator.lookup_build(Arc::new(build)).await.unwrap()
    }

    pub fn status(&self, id: &BuildId) -> BuildStatus {
        self.store.snapshot(id).unwrap().status
    }

    /// Event names in order, status and log events excluded.
    pub fn trace(&self, id: &BuildId) -> Vec<&'static str> {
        self.store
            .decoded_events(id)
            .iter()
            .filter(|e| !matches!(e, Event::Status { .. } | Event::Log { .. }))
            .map(Event::name)
            .collect()
    }

    pub fn statuses(&self, id: &BuildId) -> Vec<BuildStatus> {
        self.store
            .decoded_events(id)
            .into_iter()
            .filter_map(|e| match e {
                Event::Status { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }
}

/// Poll until `cond` holds, failing the test after [`SPEC_WAIT_MAX`].
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(SPEC_WAIT_MAX, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("condition not met within {SPEC_WAIT_MAX:?}"));
}
