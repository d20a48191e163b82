//! Metrics facade wrappers for the preload scheduler.
//!
//! Nothing is exported unless the embedding application installs a
//! `metrics` recorder.

use ::metrics::{counter, describe_counter, describe_gauge, gauge};

pub const STARTED: &str = "preload_started_total";
pub const COMPLETED: &str = "preload_completed_total";
pub const ERRORS: &str = "preload_errors_total";
pub const SKIPPED: &str = "preload_skipped_total";
pub const CLEARED: &str = "preload_cleared_total";
pub const STALE_SIGNALS: &str = "preload_stale_signals_total";
pub const REGISTERED: &str = "preload_registered_resources";

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(STARTED, "Resources that began preloading");
    describe_counter!(COMPLETED, "Resources that reached their target status");
    describe_counter!(ERRORS, "Resources whose preload failed");
    describe_counter!(SKIPPED, "Resources skipped or taken over by playback");
    describe_counter!(CLEARED, "Resources whose preloaded state was cleared");
    describe_counter!(STALE_SIGNALS, "Lifecycle signals from superseded resources");
    describe_gauge!(REGISTERED, "Resources currently registered");
}

pub fn record_started() {
    counter!(STARTED).increment(1);
}

pub fn record_cleared() {
    counter!(CLEARED).increment(1);
}

/// Record a retired preload by outcome (`completed`, `error`, `skipped`).
pub fn record_outcome(outcome: &str) {
    match outcome {
        "completed" => counter!(COMPLETED).increment(1),
        "error" => counter!(ERRORS).increment(1),
        _ => counter!(SKIPPED).increment(1),
    }
}

pub fn record_stale_signal(kind: &'static str) {
    counter!(STALE_SIGNALS, "kind" => kind).increment(1);
}

pub fn record_registered(count: usize) {
    gauge!(REGISTERED).set(count as f64);
}
