//! Staged preload binding.
//!
//! Binds the generic scheduler to sources with a three-stage lifecycle
//! (prepared, tracks selected, loaded for a duration). Source work runs on a
//! dedicated preload worker; each source reports progress through a
//! [`StagedControl`] that decides whether it continues.

mod builder;
mod control;
mod simulated;
mod worker;

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

pub use builder::StagedPreloadManagerBuilder;
pub use control::StagedControl;
pub use simulated::{FailurePoint, SimulatedFactory, SimulatedSource, SourceProfile, SourceState};
pub use worker::{Job, PreloadWorker, WorkerConfig};

use crate::error::SchedulerError;
use crate::scheduler::{
    PlaybackPosition, PreloadListener, PreloadScheduler, PreloadStatus, PreloadStrategy,
    ResourceFactory, ResourceHandle, ResourceLink, TargetStatusPolicy,
};

/// A source that preloads in stages on the preload worker.
///
/// All three methods are invoked on the worker thread, in posting order.
/// `preload` may call back into its control synchronously.
pub trait StagedSource: Send + Sync + 'static {
    fn preload(&self, start_position_us: Option<i64>);

    /// Drop loaded media, keeping the source prepared.
    fn clear(&self);

    fn release(&self);
}

/// Creates staged sources. Must not start any I/O.
pub trait SourceFactory<I>: Send + Sync + 'static {
    type Source: StagedSource;

    fn create(&self, item: &I, control: StagedControl<I, Self::Source>) -> Self::Source;
}

struct FactoryAdapter<F>(F);

impl<I, F> ResourceFactory<I, i64, PlaybackPosition, F::Source> for FactoryAdapter<F>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    F: SourceFactory<I>,
{
    fn create(
        &self,
        item: &I,
        link: ResourceLink<I, i64, PlaybackPosition, F::Source>,
    ) -> F::Source {
        self.0.create(item, StagedControl::new(item.clone(), link))
    }
}

/// Runs source operations on the preload worker.
struct StagedStrategy {
    worker: Arc<PreloadWorker>,
}

impl StagedStrategy {
    fn post(&self, operation: &'static str, job: impl FnOnce() + Send + 'static) {
        if let Err(error) = self.worker.post(Box::new(job)) {
            warn!(operation, %error, "preload: worker rejected job");
        }
    }
}

impl<S: StagedSource> PreloadStrategy<S> for StagedStrategy {
    fn start(&self, resource: &Arc<S>, start_position_us: Option<i64>) {
        let source = Arc::clone(resource);
        self.post("start", move || source.preload(start_position_us));
    }

    fn clear(&self, resource: &Arc<S>) {
        let source = Arc::clone(resource);
        self.post("clear", move || source.clear());
    }

    fn release(&self, resource: &Arc<S>) {
        let source = Arc::clone(resource);
        self.post("release", move || source.release());
    }

    fn teardown(&self) {
        self.worker.shutdown();
    }
}

/// Preload manager for staged sources ranked by playlist index.
///
/// Ranking keys are playlist indices; `invalidate()` prefers the items
/// closest to the index set with `set_current_playing_index()`.
pub struct StagedPreloadManager<I, F>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    F: SourceFactory<I>,
{
    scheduler: PreloadScheduler<I, i64, PlaybackPosition, F::Source>,
    worker: Arc<PreloadWorker>,
    position: Mutex<PlaybackPosition>,
}

impl<I, F> StagedPreloadManager<I, F>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    F: SourceFactory<I>,
{
    pub fn builder<P>(factory: F, policy: P) -> StagedPreloadManagerBuilder<I, F>
    where
        P: TargetStatusPolicy<i64> + 'static,
    {
        StagedPreloadManagerBuilder::new(factory, Arc::new(policy))
    }

    pub fn add(&self, item: I, index: i64) -> Result<ResourceHandle, SchedulerError> {
        self.scheduler.add(item, index)
    }

    pub fn add_with_start_position(
        &self,
        item: I,
        index: i64,
        start_position_us: Option<i64>,
    ) -> Result<ResourceHandle, SchedulerError> {
        self.scheduler.add_with_start_position(item, index, start_position_us)
    }

    /// Register a source built by `make` rather than the factory.
    pub fn add_source<M>(
        &self,
        item: I,
        index: i64,
        start_position_us: Option<i64>,
        make: M,
    ) -> Result<ResourceHandle, SchedulerError>
    where
        M: FnOnce(&I, StagedControl<I, F::Source>) -> F::Source,
    {
        self.scheduler.add_with(item, index, start_position_us, |item, link| {
            make(item, StagedControl::new(item.clone(), link))
        })
    }

    pub fn remove(&self, item: &I) -> bool {
        self.scheduler.remove(item)
    }

    pub fn get(&self, item: &I) -> Option<Arc<F::Source>> {
        self.scheduler.get(item)
    }

    pub fn source_count(&self) -> usize {
        self.scheduler.source_count()
    }

    /// Set the playlist index being played. Takes effect on the next
    /// `invalidate()`.
    pub fn set_current_playing_index(&self, index: i64) {
        *self.position.lock() = PlaybackPosition::at(index);
    }

    pub fn current_playing_index(&self) -> Option<i64> {
        self.position.lock().current_index()
    }

    /// Re-rank all sources around the current playing index and start the
    /// best candidate.
    pub fn invalidate(&self) {
        let position = *self.position.lock();
        self.scheduler.invalidate(&position);
    }

    pub fn reset(&self) {
        self.scheduler.reset();
    }

    /// Release all sources and stop the preload worker. Idempotent.
    pub fn release(&self) {
        self.scheduler.release();
    }

    pub fn is_released(&self) -> bool {
        self.scheduler.is_released()
    }

    pub fn active_item(&self) -> Option<I> {
        self.scheduler.active_item()
    }

    pub fn current_target(&self) -> Option<PreloadStatus> {
        self.scheduler.current_target()
    }

    pub fn add_listener(&self, listener: Arc<dyn PreloadListener<I>>) {
        self.scheduler.add_listener(listener);
    }

    /// # Panics
    /// When called off the thread that built the manager.
    pub fn remove_listener(&self, listener: &Arc<dyn PreloadListener<I>>) -> bool {
        self.scheduler.remove_listener(listener)
    }

    /// # Panics
    /// When called off the thread that built the manager.
    pub fn clear_listeners(&self) {
        self.scheduler.clear_listeners();
    }

    /// Apply lifecycle events reported so far without waiting.
    pub fn dispatch_pending(&self) -> usize {
        self.scheduler.dispatch_pending()
    }

    /// Wait for the next lifecycle event and apply it.
    pub async fn dispatch_next(&self) {
        self.scheduler.dispatch_next().await;
    }

    pub fn worker_name(&self) -> &str {
        self.worker.name()
    }
}

impl<I, F> Drop for StagedPreloadManager<I, F>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    F: SourceFactory<I>,
{
    fn drop(&mut self) {
        self.scheduler.release();
    }
}

#[cfg(test)]
#[path = "staged_tests.rs"]
mod tests;
