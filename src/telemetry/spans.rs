//! Span helpers for preload lifecycle tracing.

use std::fmt::Debug;
use tracing::{info_span, Span};

/// Extension trait for recording preload outcomes on a span.
pub trait SpanExt {
    /// Record how the preload of the span's item ended.
    fn record_outcome(&self, outcome: &str);

    /// Mark the span failed with `error`.
    fn record_error(&self, error: &dyn std::fmt::Display);
}

impl SpanExt for Span {
    fn record_outcome(&self, outcome: &str) {
        self.record("outcome", outcome);
    }

    fn record_error(&self, error: &dyn std::fmt::Display) {
        self.record("outcome", "error");
        self.record("error.message", error.to_string().as_str());
    }
}

/// Factory for per-item preload spans.
pub struct PreloadSpan;

impl PreloadSpan {
    /// Span for one lifecycle event of `item`.
    ///
    /// `outcome` and `error.message` are left empty for `SpanExt` to fill.
    pub fn new(item: &dyn Debug, handle: u64) -> Span {
        info_span!(
            "preload",
            item = ?item,
            handle,
            outcome = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
