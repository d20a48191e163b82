//! In-process simulated source.
//!
//! Walks prepare, track selection and chunked loading on the preload worker,
//! consulting its control at every step exactly like a real media pipeline
//! would. Used by the simulation binary and by tests.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

use super::{SourceFactory, StagedControl, StagedSource};
use crate::error::SourceError;

/// Where a simulated source fails, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Prepare,
    TrackSelection,
    /// After this much media has been buffered.
    Loading { after_us: u64 },
}

/// Shape of a simulated source.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub duration_us: u64,
    /// Media loaded per continue-loading round.
    pub chunk_us: u64,
    pub fail_at: Option<FailurePoint>,
    /// Simulated work per step.
    pub step_delay: Duration,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            duration_us: 10_000_000,
            chunk_us: 250_000,
            fail_at: None,
            step_delay: Duration::ZERO,
        }
    }
}

/// Lifecycle state of a simulated source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SourceState {
    Idle,
    Preparing,
    Prepared,
    TracksSelected,
    Loading,
    LoadedToEnd,
    Errored,
    Released,
}

#[derive(Debug)]
struct Progress {
    state: SourceState,
    buffered_us: u64,
    preloads: usize,
    clears: usize,
}

/// A source that pretends to prepare and load media.
pub struct SimulatedSource<I> {
    control: StagedControl<I, SimulatedSource<I>>,
    profile: SourceProfile,
    progress: Mutex<Progress>,
}

impl<I> SimulatedSource<I>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    pub fn new(control: StagedControl<I, SimulatedSource<I>>, profile: SourceProfile) -> Self {
        Self {
            control,
            profile,
            progress: Mutex::new(Progress {
                state: SourceState::Idle,
                buffered_us: 0,
                preloads: 0,
                clears: 0,
            }),
        }
    }

    pub fn item(&self) -> &I {
        self.control.item()
    }

    pub fn state(&self) -> SourceState {
        self.progress.lock().state
    }

    pub fn buffered_us(&self) -> u64 {
        self.progress.lock().buffered_us
    }

    /// Number of `preload()` calls received.
    pub fn preload_count(&self) -> usize {
        self.progress.lock().preloads
    }

    /// Number of `clear()` calls received.
    pub fn clear_count(&self) -> usize {
        self.progress.lock().clears
    }

    /// Playback takes this source over.
    pub fn hand_to_player(&self) {
        self.control.on_used_by_player();
    }

    fn set_state(&self, state: SourceState) {
        self.progress.lock().state = state;
    }

    fn step(&self) {
        if !self.profile.step_delay.is_zero() {
            thread::sleep(self.profile.step_delay);
        }
    }

    fn fail(&self, cause: SourceError) {
        self.set_state(SourceState::Errored);
        self.control.fail(cause);
    }

    fn prepare(&self) -> bool {
        if self.state() >= SourceState::Prepared {
            return true;
        }
        self.set_state(SourceState::Preparing);
        self.step();
        if self.profile.fail_at == Some(FailurePoint::Prepare) {
            self.fail(SourceError::Parse("unreadable container".into()));
            return false;
        }
        self.set_state(SourceState::Prepared);
        true
    }

    fn select_tracks(&self) -> bool {
        if self.state() >= SourceState::TracksSelected {
            return true;
        }
        self.step();
        if self.profile.fail_at == Some(FailurePoint::TrackSelection) {
            self.fail(SourceError::Unsupported("no playable tracks".into()));
            return false;
        }
        self.set_state(SourceState::TracksSelected);
        true
    }

    fn load(&self) {
        loop {
            let buffered = self.buffered_us();
            if buffered >= self.profile.duration_us {
                self.set_state(SourceState::LoadedToEnd);
                self.control.on_loaded_to_end();
                return;
            }
            if !self.control.on_continue_loading_requested(buffered) {
                return;
            }
            self.set_state(SourceState::Loading);
            self.step();
            if let Some(FailurePoint::Loading { after_us }) = self.profile.fail_at {
                if buffered >= after_us {
                    self.fail(SourceError::Network("connection reset".into()));
                    return;
                }
            }
            let chunk = self.profile.chunk_us.max(1);
            self.progress.lock().buffered_us = (buffered + chunk).min(self.profile.duration_us);
        }
    }
}

impl<I> StagedSource for SimulatedSource<I>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    fn preload(&self, start_position_us: Option<i64>) {
        {
            let mut progress = self.progress.lock();
            if progress.state == SourceState::Released {
                return;
            }
            if progress.state == SourceState::Errored {
                progress.state = SourceState::Idle;
                progress.buffered_us = 0;
            }
            progress.preloads += 1;
        }
        trace!(item = ?self.item(), ?start_position_us, "simulated preload");

        if !self.prepare() || !self.control.on_source_prepared() {
            return;
        }
        if !self.select_tracks() || !self.control.on_tracks_selected() {
            return;
        }
        self.load();
    }

    fn clear(&self) {
        let mut progress = self.progress.lock();
        progress.clears += 1;
        if matches!(
            progress.state,
            SourceState::TracksSelected | SourceState::Loading | SourceState::LoadedToEnd
        ) {
            progress.state = SourceState::Prepared;
            progress.buffered_us = 0;
        }
    }

    fn release(&self) {
        let mut progress = self.progress.lock();
        progress.state = SourceState::Released;
        progress.buffered_us = 0;
    }
}

/// Builds simulated sources, with optional per-item profiles.
pub struct SimulatedFactory<I> {
    default_profile: SourceProfile,
    profiles: HashMap<I, SourceProfile>,
}

impl<I: Eq + Hash> SimulatedFactory<I> {
    pub fn new(default_profile: SourceProfile) -> Self {
        Self { default_profile, profiles: HashMap::new() }
    }

    pub fn with_profile(mut self, item: I, profile: SourceProfile) -> Self {
        self.profiles.insert(item, profile);
        self
    }
}

impl<I> SourceFactory<I> for SimulatedFactory<I>
where
    I: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    type Source = SimulatedSource<I>;

    fn create(&self, item: &I, control: StagedControl<I, Self::Source>) -> Self::Source {
        let profile = self.profiles.get(item).unwrap_or(&self.default_profile).clone();
        SimulatedSource::new(control, profile)
    }
}
