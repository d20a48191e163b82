//! Generic preload scheduling.
//!
//! Registry, priority queue, target status policy and the scheduler that
//! arbitrates which single resource preloads at a time.

mod core;
mod dispatch;
mod queue;
mod ranking;
mod registry;
mod status;

pub use self::core::{
    ActivePreload, PreloadScheduler, PreloadStrategy, ResourceFactory, ResourceLink,
    SchedulerConfig, SchedulerHandle,
};
pub use dispatch::{LifecycleEvent, PreloadListener};
pub use queue::PreloadQueue;
pub use ranking::{DistanceComparator, NaturalOrder, PlaybackPosition, RankingComparator};
pub use registry::{ResourceHandle, ResourceHolder, ResourceRegistry};
pub use status::{PreloadStage, PreloadStatus, TargetStatusPolicy};
