//! The preload scheduler.
//!
//! Owns the registry, the priority queue and the target status of the one
//! resource currently preloading, all behind a single lock. `invalidate()`
//! rebuilds the queue and starts the best candidate the policy grants a
//! target to. Completion, error and skip signals arrive as events and are
//! applied on the owning thread by `dispatch_pending()` / `dispatch_next()`.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace, warn};

use super::dispatch::{EventDispatcher, LifecycleEvent, PreloadListener};
use super::queue::PreloadQueue;
use super::ranking::RankingComparator;
use super::registry::{ResourceHandle, ResourceHolder, ResourceRegistry};
use super::status::{PreloadStatus, TargetStatusPolicy};
use crate::error::{PreloadError, SchedulerError};
use crate::telemetry::metrics;
use crate::telemetry::{PreloadSpan, SpanExt};

/// Binding-specific operations on a resource.
///
/// Every method must return promptly: they run with the scheduler lock held
/// and must not call back into the scheduler synchronously.
pub trait PreloadStrategy<R>: Send + Sync {
    /// Begin preloading towards the current target.
    fn start(&self, resource: &Arc<R>, start_position_us: Option<i64>);

    /// Drop preloaded state while keeping the resource registered.
    fn clear(&self, resource: &Arc<R>);

    /// Release the resource for good.
    fn release(&self, resource: &Arc<R>);

    /// Whether the scheduler may start the next candidate now.
    fn should_start_next(&self) -> bool {
        true
    }

    /// One-time teardown of binding-owned state on `release()`.
    fn teardown(&self) {}
}

/// Constructs resources for registered items. Must not start any I/O.
pub trait ResourceFactory<I, K, C, R>: Send + Sync {
    fn create(&self, item: &I, link: ResourceLink<I, K, C, R>) -> R;
}

impl<I, K, C, R, F> ResourceFactory<I, K, C, R> for F
where
    F: Fn(&I, ResourceLink<I, K, C, R>) -> R + Send + Sync,
{
    fn create(&self, item: &I, link: ResourceLink<I, K, C, R>) -> R {
        self(item, link)
    }
}

/// What a newly created resource needs to report back to its scheduler.
pub struct ResourceLink<I, K, C, R> {
    pub handle: ResourceHandle,
    pub scheduler: SchedulerHandle<I, K, C, R>,
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum events applied by one `dispatch_pending()` call.
    pub dispatch_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { dispatch_batch: 64 }
    }
}

/// The resource currently preloading and the status it is preloading to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePreload {
    pub handle: ResourceHandle,
    pub status: PreloadStatus,
}

struct SchedulerState<I, K, R> {
    registry: ResourceRegistry<I, K, R>,
    queue: PreloadQueue<ResourceHandle>,
    current: Option<ActivePreload>,
    released: bool,
}

impl<I, K, R> SchedulerState<I, K, R> {
    /// Drop `handle` from the queue. Returns whether it was the active preload.
    fn detach(&mut self, handle: ResourceHandle) -> bool {
        self.queue.remove_where(|h| *h == handle);
        let was_active = self.current.map(|a| a.handle) == Some(handle);
        if was_active {
            self.current = None;
        }
        was_active
    }
}

struct Shared<I, K, C, R> {
    state: Mutex<SchedulerState<I, K, R>>,
    comparator: Arc<dyn RankingComparator<K, C>>,
    policy: Arc<dyn TargetStatusPolicy<K>>,
    strategy: Arc<dyn PreloadStrategy<R>>,
    events: UnboundedSender<LifecycleEvent<I>>,
}

impl<I, K, C, R> Shared<I, K, C, R>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    K: Send + Sync + 'static,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Pop candidates until one gets a target (and starts) or the queue
    /// empties. Candidates without a target are cleared, not released.
    fn start_next_locked(&self, state: &mut SchedulerState<I, K, R>) {
        state.current = None;
        while let Some(&handle) = state.queue.peek() {
            if !self.strategy.should_start_next() {
                debug!("preload: binding deferred starting the next candidate");
                return;
            }
            let Some(holder) = state.registry.get(handle) else {
                state.queue.pop();
                continue;
            };
            match self.policy.target_status(&holder.ranking_key) {
                Some(status) => {
                    debug!(item = ?holder.item, ?status, "preload: starting");
                    state.current = Some(ActivePreload { handle, status });
                    self.strategy.start(&holder.resource, holder.start_position_us);
                    metrics::record_started();
                    return;
                }
                None => {
                    debug!(item = ?holder.item, "preload: no target, clearing");
                    self.strategy.clear(&holder.resource);
                    metrics::record_cleared();
                    state.queue.pop();
                }
            }
        }
    }

    /// Retire `handle` if it is still the active preload and start the next
    /// candidate. Returns the retired item, or `None` for a stale signal.
    fn advance_if_active(&self, handle: ResourceHandle) -> Option<I> {
        let mut state = self.state.lock();
        if state.current.map(|a| a.handle) != Some(handle) {
            return None;
        }
        let item = state.registry.get(handle).map(|h| h.item.clone());
        state.queue.pop();
        self.start_next_locked(&mut state);
        item
    }

    fn active_target(&self, handle: ResourceHandle) -> Option<PreloadStatus> {
        let state = self.state.lock();
        state.current.filter(|a| a.handle == handle).map(|a| a.status)
    }

    fn resource(&self, handle: ResourceHandle) -> Option<Arc<R>> {
        let state = self.state.lock();
        state.registry.get(handle).map(|h| Arc::clone(&h.resource))
    }
}

/// Cloneable, non-owning access to a scheduler for resources and workers.
pub struct SchedulerHandle<I, K, C, R> {
    shared: Weak<Shared<I, K, C, R>>,
}

impl<I, K, C, R> Clone for SchedulerHandle<I, K, C, R> {
    fn clone(&self) -> Self {
        Self { shared: Weak::clone(&self.shared) }
    }
}

impl<I, K, C, R> SchedulerHandle<I, K, C, R>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    K: Send + Sync + 'static,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// The current target of `handle`, or `None` if it is not the active
    /// preload (superseded, removed, or never started).
    ///
    /// Always reflects the latest `invalidate()`.
    pub fn active_target(&self, handle: ResourceHandle) -> Option<PreloadStatus> {
        self.shared.upgrade()?.active_target(handle)
    }

    pub fn is_active(&self, handle: ResourceHandle) -> bool {
        self.active_target(handle).is_some()
    }

    /// Clear the preloaded state of `handle` through the binding.
    pub fn clear(&self, handle: ResourceHandle) {
        let Some(shared) = self.shared.upgrade() else { return };
        if let Some(resource) = shared.resource(handle) {
            shared.strategy.clear(&resource);
            metrics::record_cleared();
        }
    }

    pub fn signal_completed(&self, handle: ResourceHandle) {
        self.post(LifecycleEvent::Completed(handle));
    }

    pub fn signal_skipped(&self, handle: ResourceHandle) {
        self.post(LifecycleEvent::Skipped(handle));
    }

    pub fn signal_error(&self, handle: ResourceHandle, error: PreloadError<I>) {
        self.post(LifecycleEvent::Failed(handle, error));
    }

    fn post(&self, event: LifecycleEvent<I>) {
        let Some(shared) = self.shared.upgrade() else {
            trace!(handle = event.handle().id(), "preload: scheduler gone, dropping signal");
            return;
        };
        if shared.events.send(event).is_err() {
            trace!("preload: event channel closed, dropping signal");
        }
    }
}

/// Decides which registered resource preloads, and advances through them.
///
/// `add`, `remove`, `invalidate`, `reset` and `release` should be called from
/// one consistent thread. Listener removal is confined to the thread that
/// created the scheduler and panics elsewhere.
pub struct PreloadScheduler<I, K, C, R> {
    shared: Arc<Shared<I, K, C, R>>,
    factory: Arc<dyn ResourceFactory<I, K, C, R>>,
    dispatcher: EventDispatcher<I>,
    config: SchedulerConfig,
}

impl<I, K, C, R> PreloadScheduler<I, K, C, R>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    K: Send + Sync + 'static,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Create a scheduler owned by the calling thread.
    pub fn new(
        factory: Arc<dyn ResourceFactory<I, K, C, R>>,
        comparator: Arc<dyn RankingComparator<K, C>>,
        policy: Arc<dyn TargetStatusPolicy<K>>,
        strategy: Arc<dyn PreloadStrategy<R>>,
        config: SchedulerConfig,
    ) -> Self {
        let dispatcher = EventDispatcher::new();
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState {
                registry: ResourceRegistry::new(),
                queue: PreloadQueue::new(),
                current: None,
                released: false,
            }),
            comparator,
            policy,
            strategy,
            events: dispatcher.sender(),
        });
        Self { shared, factory, dispatcher, config }
    }

    pub fn handle(&self) -> SchedulerHandle<I, K, C, R> {
        SchedulerHandle { shared: Arc::downgrade(&self.shared) }
    }

    /// Register `item`, constructing its resource through the factory.
    ///
    /// Nothing starts preloading until the next `invalidate()`.
    pub fn add(&self, item: I, ranking_key: K) -> Result<ResourceHandle, SchedulerError> {
        self.add_with_start_position(item, ranking_key, None)
    }

    pub fn add_with_start_position(
        &self,
        item: I,
        ranking_key: K,
        start_position_us: Option<i64>,
    ) -> Result<ResourceHandle, SchedulerError> {
        let factory = Arc::clone(&self.factory);
        self.add_with(item, ranking_key, start_position_us, move |item, link| {
            factory.create(item, link)
        })
    }

    /// Register `item` with a resource built by `make` instead of the factory.
    ///
    /// Re-adding an item that is already registered releases the previous
    /// resource; any signal it still sends is ignored.
    pub fn add_with<F>(
        &self,
        item: I,
        ranking_key: K,
        start_position_us: Option<i64>,
        make: F,
    ) -> Result<ResourceHandle, SchedulerError>
    where
        F: FnOnce(&I, ResourceLink<I, K, C, R>) -> R,
    {
        let handle = {
            let mut state = self.shared.state.lock();
            if state.released {
                return Err(SchedulerError::Released);
            }
            state.registry.next_handle()
        };

        let resource = Arc::new(make(&item, ResourceLink { handle, scheduler: self.handle() }));

        let (displaced, count) = {
            let mut state = self.shared.state.lock();
            if state.released {
                drop(state);
                self.shared.strategy.release(&resource);
                return Err(SchedulerError::Released);
            }
            let holder = ResourceHolder { item, resource, ranking_key, start_position_us };
            let displaced = state.registry.insert(handle, holder);
            if let Some((old, _)) = &displaced {
                state.detach(*old);
            }
            (displaced, state.registry.len())
        };

        if let Some((_, old)) = displaced {
            debug!(item = ?old.item, "preload: replacing registered resource");
            self.shared.strategy.release(&old.resource);
        }
        metrics::record_registered(count);
        Ok(handle)
    }

    /// Unregister `item` and release its resource. Returns whether it was
    /// registered. Removing the active preload leaves nothing preloading
    /// until the next `invalidate()`.
    pub fn remove(&self, item: &I) -> bool {
        let (holder, count) = {
            let mut state = self.shared.state.lock();
            let Some((handle, holder)) = state.registry.remove(item) else {
                return false;
            };
            if state.detach(handle) {
                debug!(?item, "preload: removed the active preload");
            }
            (holder, state.registry.len())
        };
        self.shared.strategy.release(&holder.resource);
        metrics::record_registered(count);
        true
    }

    pub fn get(&self, item: &I) -> Option<Arc<R>> {
        self.shared.state.lock().registry.resource_for(item)
    }

    pub fn source_count(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    /// Rebuild the queue under `ctx` and start the best candidate that the
    /// policy grants a target to.
    pub fn invalidate(&self, ctx: &C) {
        let mut state = self.shared.state.lock();
        if state.released {
            warn!("preload: invalidate() after release() ignored");
            return;
        }
        let comparator = &self.shared.comparator;
        let SchedulerState { registry, queue, .. } = &mut *state;
        let registry = &*registry;
        queue.rebuild(registry.iter().map(|(h, _)| h), |a, b| {
            match (registry.get(*a), registry.get(*b)) {
                (Some(a), Some(b)) => comparator.compare(&a.ranking_key, &b.ranking_key, ctx),
                _ => std::cmp::Ordering::Equal,
            }
        });
        debug!(candidates = state.queue.len(), "preload: queue rebuilt");
        self.shared.start_next_locked(&mut state);
    }

    /// Release every resource and empty the registry and queue. Idempotent.
    pub fn reset(&self) {
        let holders = {
            let mut state = self.shared.state.lock();
            state.queue.clear();
            state.current = None;
            state.registry.drain()
        };
        if !holders.is_empty() {
            debug!(count = holders.len(), "preload: reset");
        }
        for holder in &holders {
            self.shared.strategy.release(&holder.resource);
        }
        metrics::record_registered(0);
    }

    /// Reset, tear down the binding and drop all listeners. The scheduler
    /// rejects further registrations afterwards.
    pub fn release(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.released {
                return;
            }
            state.released = true;
        }
        self.reset();
        self.shared.strategy.teardown();
        self.dispatcher.release();
        info!("preload: scheduler released");
    }

    pub fn is_released(&self) -> bool {
        self.shared.state.lock().released
    }

    /// The item currently preloading.
    pub fn active_item(&self) -> Option<I> {
        let state = self.shared.state.lock();
        let active = state.current?;
        state.registry.get(active.handle).map(|h| h.item.clone())
    }

    /// Target status of the item currently preloading.
    pub fn current_target(&self) -> Option<PreloadStatus> {
        self.shared.state.lock().current.map(|a| a.status)
    }

    /// Items still queued, best first, including the active one.
    pub fn queued_items(&self) -> Vec<I> {
        let state = self.shared.state.lock();
        state
            .queue
            .iter()
            .filter_map(|h| state.registry.get(*h).map(|holder| holder.item.clone()))
            .collect()
    }

    pub fn add_listener(&self, listener: Arc<dyn PreloadListener<I>>) {
        self.dispatcher.add_listener(listener);
    }

    /// # Panics
    /// When called from a thread other than the one that created the scheduler.
    pub fn remove_listener(&self, listener: &Arc<dyn PreloadListener<I>>) -> bool {
        self.dispatcher.remove_listener(listener)
    }

    /// # Panics
    /// When called from a thread other than the one that created the scheduler.
    pub fn clear_listeners(&self) {
        self.dispatcher.clear_listeners();
    }

    /// Apply queued lifecycle events without waiting, up to the configured
    /// batch size. Returns how many events were consumed.
    ///
    /// Listeners run on the calling thread. Drain from the thread that
    /// created the scheduler so notifications arrive where listeners were
    /// registered.
    pub fn dispatch_pending(&self) -> usize {
        let mut applied = 0;
        while applied < self.config.dispatch_batch.max(1) {
            let Some(event) = self.dispatcher.try_next() else { break };
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next lifecycle event and apply it.
    ///
    /// Same threading rule as [`Self::dispatch_pending`]: await this on the
    /// owning thread, e.g. from a current-thread runtime.
    pub async fn dispatch_next(&self) {
        if let Some(event) = self.dispatcher.next().await {
            self.apply(event);
        }
    }

    fn apply(&self, event: LifecycleEvent<I>) {
        let handle = event.handle();
        let kind = event.kind();
        let Some(item) = self.shared.advance_if_active(handle) else {
            trace!(handle = handle.id(), kind, "preload: ignoring stale signal");
            metrics::record_stale_signal(kind);
            return;
        };

        let span = PreloadSpan::new(&item, handle.id());
        let _entered = span.enter();
        metrics::record_outcome(kind);
        match event {
            LifecycleEvent::Completed(_) => {
                span.record_outcome(kind);
                info!("preload: completed");
                self.dispatcher.notify_completed(&item);
            }
            LifecycleEvent::Failed(_, error) => {
                span.record_error(&error);
                warn!(%error, "preload: failed, advancing");
                self.dispatcher.notify_error(&error);
            }
            LifecycleEvent::Skipped(_) => {
                span.record_outcome(kind);
                debug!("preload: skipped");
            }
        }
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
