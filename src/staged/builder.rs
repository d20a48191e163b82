//! Builder for [`StagedPreloadManager`].

use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::{
    FactoryAdapter, PreloadWorker, SourceFactory, StagedPreloadManager, StagedStrategy,
    WorkerConfig,
};
use crate::config::EnvConfig;
use crate::error::SchedulerError;
use crate::scheduler::{
    DistanceComparator, PlaybackPosition, PreloadScheduler, SchedulerConfig, TargetStatusPolicy,
};

pub struct StagedPreloadManagerBuilder<I, F> {
    factory: F,
    policy: Arc<dyn TargetStatusPolicy<i64>>,
    worker: WorkerConfig,
    scheduler: SchedulerConfig,
    _item: PhantomData<fn(I)>,
}

impl<I, F> StagedPreloadManagerBuilder<I, F>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    F: SourceFactory<I>,
{
    pub(super) fn new(factory: F, policy: Arc<dyn TargetStatusPolicy<i64>>) -> Self {
        Self {
            factory,
            policy,
            worker: WorkerConfig::default(),
            scheduler: SchedulerConfig::default(),
            _item: PhantomData,
        }
    }

    pub fn worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker = config;
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Take worker and scheduler settings from the environment config.
    pub fn env_config(self, config: &EnvConfig) -> Self {
        self.worker_config(config.worker.clone()).scheduler_config(config.scheduler.clone())
    }

    /// Spawn the preload worker and assemble the manager.
    ///
    /// The calling thread becomes the manager's owning thread.
    pub fn build(self) -> Result<StagedPreloadManager<I, F>, SchedulerError> {
        let worker = Arc::new(PreloadWorker::spawn(self.worker)?);
        let strategy = Arc::new(StagedStrategy { worker: Arc::clone(&worker) });
        let scheduler = PreloadScheduler::<I, i64, PlaybackPosition, F::Source>::new(
            Arc::new(FactoryAdapter(self.factory)),
            Arc::new(DistanceComparator),
            self.policy,
            strategy,
            self.scheduler,
        );
        info!(worker = worker.name(), "staged preload manager ready");
        Ok(StagedPreloadManager {
            scheduler,
            worker,
            position: Mutex::new(PlaybackPosition::unset()),
        })
    }
}
