//! Telemetry for the preload engine.
//!
//! Structured logging via `tracing`, per-item spans, and counters through the
//! `metrics` facade.

mod logging;
pub mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::init_metrics;
pub use spans::{PreloadSpan, SpanExt};
