//! Dedicated preload worker thread.
//!
//! Sources run their preparation and loading on one named thread so the
//! caller's thread is never blocked by media work. Jobs execute strictly in
//! posting order.

use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::error::SchedulerError;

/// A unit of work for the preload worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for the preload worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { thread_name: "preload-worker".to_string() }
    }
}

enum Message {
    Run(Job),
    Shutdown,
}

/// Single background thread that runs source lifecycle work in order.
pub struct PreloadWorker {
    tx: UnboundedSender<Message>,
    handle: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl PreloadWorker {
    /// Spawn the worker thread.
    pub fn spawn(config: WorkerConfig) -> Result<Self, SchedulerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || Self::run(rx))?;
        debug!(thread = %config.thread_name, "preload worker started");
        Ok(Self { tx, handle: Mutex::new(Some(handle)), name: config.thread_name })
    }

    /// Queue `job` behind everything already posted.
    pub fn post(&self, job: Job) -> Result<(), SchedulerError> {
        self.tx.send(Message::Run(job)).map_err(|_| SchedulerError::WorkerUnavailable)
    }

    /// Whether the calling thread is the worker thread.
    pub fn is_current(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the worker after the jobs already posted and wait for it.
    ///
    /// Idempotent. From the worker thread itself this only requests the
    /// stop, since the thread cannot join itself.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
        if self.is_current() {
            return;
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(thread = %self.name, "preload worker panicked");
            } else {
                debug!(thread = %self.name, "preload worker stopped");
            }
        }
    }

    fn run(mut rx: UnboundedReceiver<Message>) {
        while let Some(message) = rx.blocking_recv() {
            match message {
                Message::Run(job) => job(),
                Message::Shutdown => break,
            }
        }
    }
}

impl Drop for PreloadWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn jobs_run_in_order_on_named_thread() {
        let config = WorkerConfig { thread_name: "test-preload".into() };
        let worker = PreloadWorker::spawn(config).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            worker
                .post(Box::new(move || {
                    let name = thread::current().name().map(str::to_string);
                    seen.lock().push((i, name));
                }))
                .unwrap();
        }
        worker.shutdown();

        let seen = seen.lock();
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(seen.iter().all(|(_, n)| n.as_deref() == Some("test-preload")));
    }

    #[test]
    fn post_after_shutdown_fails() {
        let worker = PreloadWorker::spawn(WorkerConfig::default()).unwrap();
        worker.shutdown();
        worker.shutdown();
        assert!(matches!(worker.post(Box::new(|| {})), Err(SchedulerError::WorkerUnavailable)));
    }

    #[test]
    fn shutdown_from_worker_thread_does_not_join_itself() {
        let worker = Arc::new(PreloadWorker::spawn(WorkerConfig::default()).unwrap());
        let (tx, rx) = std::sync::mpsc::channel();
        let inner = Arc::clone(&worker);
        worker
            .post(Box::new(move || {
                let on_worker = inner.is_current();
                inner.shutdown();
                let _ = tx.send(on_worker);
            }))
            .unwrap();

        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(5)), Ok(true));
        worker.shutdown();
        assert!(matches!(worker.post(Box::new(|| {})), Err(SchedulerError::WorkerUnavailable)));
    }

    #[test]
    fn caller_is_not_the_worker() {
        let worker = PreloadWorker::spawn(WorkerConfig::default()).unwrap();
        assert!(!worker.is_current());
        assert_eq!(worker.name(), "preload-worker");
    }
}
