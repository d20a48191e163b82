//! Preload Core
//!
//! Decides which registered playable resource preloads at any moment, how
//! far it preloads, and when to move on to the next candidate.
//!
//! # Design Principles
//!
//! - **One at a time**: at most one resource preloads; the rest wait in a
//!   priority queue rebuilt on every `invalidate()`.
//! - **Policy driven**: a target status policy decides how far each resource
//!   goes, or whether it preloads at all.
//! - **Stale-safe**: resources are addressed by handles that are never
//!   reused, so signals from removed or superseded resources are ignored.
//! - **Owner-thread delivery**: lifecycle events are posted to a channel and
//!   applied, with listener callbacks, on the thread that owns the scheduler.
//!
//! The generic engine lives in [`scheduler`]; [`staged`] binds it to sources
//! with a prepare / select tracks / load lifecycle running on a dedicated
//! worker thread.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod staged;
pub mod telemetry;

pub use error::{PreloadError, SchedulerError, SourceError};
pub use scheduler::{
    PlaybackPosition, PreloadListener, PreloadScheduler, PreloadStage, PreloadStatus,
    ResourceHandle, SchedulerConfig,
};
pub use staged::{StagedControl, StagedPreloadManager, StagedSource, SourceFactory, WorkerConfig};
