//! Shared, cloneable handle to every backing collaborator a job handler
//! needs, built once at startup and passed by `Arc` into each dispatch.

use std::sync::Arc;

use dt_agent::{FakePlanner, HttpPlanner, Planner};
use dt_sandbox::{CircuitBreaker, PortPool};
use dt_selfheal::{FakeGenerator, Generator, HttpGenerator};
use dt_store::{BlobStore, FsBlobStore, MemoryRecordStore, RecordStore, SurrealStore};
use dt_queue::{MemoryQueueStore, QueueStore, SurrealQueueStore};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

pub struct AppContext {
    pub store: Arc<dyn RecordStore>,
    pub blob: Arc<dyn BlobStore>,
    pub queue: Arc<dyn QueueStore>,
    pub planner: Arc<dyn Planner>,
    pub generator: Arc<dyn Generator>,
    pub port_pool: Arc<PortPool>,
    pub breaker: Arc<CircuitBreaker>,
    pub config: WorkerConfig,
}

impl AppContext {
    /// Wires production backends when `config.surreal_backend` is set,
    /// in-memory ones otherwise (mirrors the teacher's "fake vs. real
    /// storage trait" convention used throughout the codebase).
    pub async fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let (store, queue): (Arc<dyn RecordStore>, Arc<dyn QueueStore>) = if config.surreal_backend {
            let surreal = SurrealStore::connect_in_memory().await?;
            let store: Arc<dyn RecordStore> = Arc::new(surreal);
            let queue: Arc<dyn QueueStore> = Arc::new(SurrealQueueStore::connect_in_memory().await?);
            (store, queue)
        } else {
            (Arc::new(MemoryRecordStore::new()), Arc::new(MemoryQueueStore::new()))
        };

        let blob: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.artifacts_base_path.clone()));

        let planner: Arc<dyn Planner> = match (&config.planner_endpoint, &config.planner_api_key) {
            (Some(endpoint), Some(key)) => Arc::new(HttpPlanner::new(endpoint.clone(), key.clone())),
            _ => Arc::new(FakePlanner::new(Vec::new())),
        };

        let generator: Arc<dyn Generator> = match (&config.generator_endpoint, &config.generator_api_key) {
            (Some(endpoint), Some(key)) => Arc::new(HttpGenerator::new(endpoint.clone(), key.clone())),
            _ => Arc::new(FakeGenerator::new(Vec::new())),
        };

        let port_pool = Arc::new(PortPool::new(
            config.vnc_port_range.0,
            config.vnc_port_range.1,
            config.port_max_age_minutes,
        ));

        let breaker = Arc::new(CircuitBreaker::new(5));

        Ok(Self { store, blob, queue, planner, generator, port_pool, breaker, config })
    }
}
