use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::orchestrator::Orchestrator;
use crate::{
    cache::TaskCache,
    core::{ContinuationCoordinator, RetryExecutor, StatusPoller},
    core::Config,
    events::Bus,
    remote::RemoteGenerationApi,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`Orchestrator`] with optional subscribers.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    cache: Option<TaskCache>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            cache: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (submissions, checks, retries,
    /// continuations) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses an existing cache instead of creating one from `cfg.cache`.
    ///
    /// Sweeps of a cache built elsewhere are not reported on this orchestrator's bus.
    pub fn with_cache(mut self, cache: TaskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the orchestrator around `remote`.
    ///
    /// Initializes:
    /// - the event bus and subscriber workers (plus the bus → subscribers listener)
    /// - the task cache
    /// - the retry executor, poller and continuation coordinator
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self, remote: Arc<dyn RemoteGenerationApi>) -> Orchestrator {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let listener_token = CancellationToken::new();

        let cache = self
            .cache
            .unwrap_or_else(|| TaskCache::with_bus(self.cfg.cache.clone(), bus.clone()));
        let retry = RetryExecutor::new(self.cfg.retry.clone()).with_bus(bus.clone());
        let poller = StatusPoller::new(self.cfg.poll, retry.clone()).with_bus(bus.clone());
        let coordinator = ContinuationCoordinator::new(cache, Arc::clone(&remote), retry.clone())
            .with_bus(bus.clone())
            .with_output_cap(self.cfg.output_cap());

        Orchestrator::new_internal(
            self.cfg,
            bus,
            subs,
            listener_token,
            remote,
            retry,
            poller,
            coordinator,
        )
    }
}
