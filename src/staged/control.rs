//! Stage-aware preload control handed to each staged source.
//!
//! A source calls back at every lifecycle milestone and is told whether to
//! keep going. Each decision re-reads the live target from the scheduler,
//! so a source that was re-prioritised mid-preload stops at the right place.

use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

use crate::error::{PreloadError, SourceError};
use crate::scheduler::{
    PlaybackPosition, PreloadStage, PreloadStatus, ResourceHandle, ResourceLink, SchedulerHandle,
};

use super::StagedSource;

/// Callback surface a [`StagedSource`] reports its progress through.
pub struct StagedControl<I, S> {
    item: I,
    handle: ResourceHandle,
    scheduler: SchedulerHandle<I, i64, PlaybackPosition, S>,
}

impl<I: Clone, S> Clone for StagedControl<I, S> {
    fn clone(&self) -> Self {
        Self { item: self.item.clone(), handle: self.handle, scheduler: self.scheduler.clone() }
    }
}

impl<I, S> StagedControl<I, S>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    S: StagedSource,
{
    pub(crate) fn new(item: I, link: ResourceLink<I, i64, PlaybackPosition, S>) -> Self {
        Self { item, handle: link.handle, scheduler: link.scheduler }
    }

    pub fn item(&self) -> &I {
        &self.item
    }

    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// The source finished preparing. Returns whether to select tracks.
    ///
    /// A source that already holds more than a `SourcePrepared` target asks
    /// for is cleared back down before completing.
    pub fn on_source_prepared(&self) -> bool {
        self.continue_or_complete(|status| status.stage > PreloadStage::SourcePrepared, true)
    }

    /// Tracks were selected. Returns whether to start loading media.
    pub fn on_tracks_selected(&self) -> bool {
        self.continue_or_complete(|status| status.stage > PreloadStage::TracksSelected, false)
    }

    /// The source wants to load more. Returns whether it may.
    pub fn on_continue_loading_requested(&self, buffered_duration_us: u64) -> bool {
        let buffered_ms = buffered_duration_us / 1000;
        self.continue_or_complete(
            |status| {
                status.stage == PreloadStage::LoadedForDurationMs
                    && status.value.is_some_and(|target_ms| target_ms > buffered_ms)
            },
            false,
        )
    }

    /// Playback took the source over.
    pub fn on_used_by_player(&self) {
        trace!(item = ?self.item, "preload: source claimed by player");
        self.scheduler.signal_skipped(self.handle);
    }

    /// Everything there is to load has been loaded.
    pub fn on_loaded_to_end(&self) {
        self.scheduler.signal_completed(self.handle);
    }

    pub fn on_preload_error(&self, error: PreloadError<I>) {
        self.scheduler.signal_error(self.handle, error);
    }

    /// Report a failure of this source with `cause`.
    pub fn fail(&self, cause: SourceError) {
        self.on_preload_error(PreloadError::from_cause(self.item.clone(), cause));
    }

    /// The target this source is preloading to, if it is the active preload.
    pub fn target(&self) -> Option<PreloadStatus> {
        self.scheduler.active_target(self.handle)
    }

    fn continue_or_complete<P>(&self, keep_loading: P, clear_exceeded: bool) -> bool
    where
        P: FnOnce(&PreloadStatus) -> bool,
    {
        let Some(target) = self.target() else {
            self.scheduler.signal_skipped(self.handle);
            return false;
        };
        if keep_loading(&target) {
            return true;
        }
        if clear_exceeded {
            self.scheduler.clear(self.handle);
        }
        self.scheduler.signal_completed(self.handle);
        false
    }
}
