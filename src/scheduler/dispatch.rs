//! Lifecycle event marshalling and listener delivery.
//!
//! Resources report completion, errors and skips from whatever thread they
//! run on by posting a `LifecycleEvent`. The events are drained in arrival
//! order by the thread that owns the scheduler, which is also where
//! listeners are invoked.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use super::registry::ResourceHandle;
use crate::error::PreloadError;

/// A lifecycle signal posted by a resource.
#[derive(Debug)]
pub enum LifecycleEvent<I> {
    /// The resource reached its target status or the end of its content.
    Completed(ResourceHandle),
    /// The resource was taken over by playback or no longer has a target.
    Skipped(ResourceHandle),
    /// The resource failed to preload.
    Failed(ResourceHandle, PreloadError<I>),
}

impl<I> LifecycleEvent<I> {
    pub fn handle(&self) -> ResourceHandle {
        match self {
            Self::Completed(h) | Self::Skipped(h) | Self::Failed(h, _) => *h,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Skipped(_) => "skipped",
            Self::Failed(..) => "error",
        }
    }
}

/// Receives preload outcomes on the scheduler's owning thread.
pub trait PreloadListener<I>: Send + Sync {
    fn on_completed(&self, _item: &I) {}

    fn on_error(&self, _error: &PreloadError<I>) {}
}

/// Event channel plus the registered listeners.
pub(crate) struct EventDispatcher<I> {
    owner: ThreadId,
    tx: UnboundedSender<LifecycleEvent<I>>,
    rx: tokio::sync::Mutex<UnboundedReceiver<LifecycleEvent<I>>>,
    listeners: Mutex<Vec<Arc<dyn PreloadListener<I>>>>,
}

impl<I> EventDispatcher<I> {
    /// Create a dispatcher owned by the calling thread.
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            owner: thread::current().id(),
            tx,
            rx: tokio::sync::Mutex::new(rx),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sender(&self) -> UnboundedSender<LifecycleEvent<I>> {
        self.tx.clone()
    }

    /// Take the next queued event without waiting.
    ///
    /// Returns `None` when the queue is empty or another caller is already
    /// draining it.
    pub(crate) fn try_next(&self) -> Option<LifecycleEvent<I>> {
        let mut rx = self.rx.try_lock().ok()?;
        match rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next event.
    pub(crate) async fn next(&self) -> Option<LifecycleEvent<I>> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn PreloadListener<I>>) {
        self.listeners.lock().push(listener);
    }

    /// Returns whether the listener was registered.
    pub(crate) fn remove_listener(&self, listener: &Arc<dyn PreloadListener<I>>) -> bool {
        self.verify_owner_thread("remove_listener");
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != listeners.len()
    }

    pub(crate) fn clear_listeners(&self) {
        self.verify_owner_thread("clear_listeners");
        self.listeners.lock().clear();
    }

    /// Drop all listeners as part of scheduler teardown.
    pub(crate) fn release(&self) {
        self.listeners.lock().clear();
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn notify_completed(&self, item: &I) {
        for listener in self.snapshot() {
            listener.on_completed(item);
        }
    }

    pub(crate) fn notify_error(&self, error: &PreloadError<I>) {
        for listener in self.snapshot() {
            listener.on_error(error);
        }
    }

    // Listeners may add or remove listeners from inside a callback.
    fn snapshot(&self) -> Vec<Arc<dyn PreloadListener<I>>> {
        self.listeners.lock().clone()
    }

    fn verify_owner_thread(&self, operation: &str) {
        let current = thread::current().id();
        if current != self.owner {
            panic!(
                "{operation} called on {current:?}, but the scheduler is confined to {:?}",
                self.owner
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        completed: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PreloadListener<u32> for Counting {
        fn on_completed(&self, _item: &u32) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _error: &PreloadError<u32>) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn events_drain_in_arrival_order() {
        let dispatcher = EventDispatcher::<u32>::new();
        let tx = dispatcher.sender();
        tx.send(LifecycleEvent::Completed(ResourceHandle::new(2))).unwrap();
        tx.send(LifecycleEvent::Skipped(ResourceHandle::new(1))).unwrap();

        assert_eq!(dispatcher.try_next().map(|e| e.handle()), Some(ResourceHandle::new(2)));
        assert_eq!(dispatcher.try_next().map(|e| e.handle()), Some(ResourceHandle::new(1)));
        assert!(dispatcher.try_next().is_none());
    }

    #[test]
    fn listeners_receive_notifications() {
        let dispatcher = EventDispatcher::<u32>::new();
        let counting = Arc::new(Counting::default());
        dispatcher.add_listener(counting.clone());

        dispatcher.notify_completed(&3);
        dispatcher.notify_error(&PreloadError::new(3, None, None));

        assert_eq!(counting.completed.load(Ordering::SeqCst), 1);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_listener_by_identity() {
        let dispatcher = EventDispatcher::<u32>::new();
        let a: Arc<dyn PreloadListener<u32>> = Arc::new(Counting::default());
        let b: Arc<dyn PreloadListener<u32>> = Arc::new(Counting::default());
        dispatcher.add_listener(a.clone());
        dispatcher.add_listener(b.clone());

        assert!(dispatcher.remove_listener(&a));
        assert!(!dispatcher.remove_listener(&a));
        assert_eq!(dispatcher.listener_count(), 1);
    }

    #[test]
    fn clear_listeners_off_owner_thread_panics() {
        let dispatcher = Arc::new(EventDispatcher::<u32>::new());
        let remote = Arc::clone(&dispatcher);
        let result = std::thread::spawn(move || remote.clear_listeners()).join();
        assert!(result.is_err());
    }
}
