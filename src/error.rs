//! Error types for the preload engine.
//!
//! Resource-scoped failures (`PreloadError`) never stop the scheduler; they
//! advance it exactly like a completion. `SchedulerError` covers misuse of
//! the scheduler itself and worker start-up failures.

use std::fmt;
use thiserror::Error;

/// Root cause reported by a resource when its preload fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported content: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Message carried by the variant, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Io(m)
            | Self::Network(m)
            | Self::Parse(m)
            | Self::Unsupported(m)
            | Self::Other(m) => m,
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A non-fatal, resource-scoped preload failure.
#[derive(Debug, Clone)]
pub struct PreloadError<I> {
    pub item: I,
    pub message: Option<String>,
    pub cause: Option<SourceError>,
}

impl<I> PreloadError<I> {
    pub fn new(item: I, message: Option<String>, cause: Option<SourceError>) -> Self {
        Self { item, message, cause }
    }

    /// Failure with a cause and no extra message.
    pub fn from_cause(item: I, cause: SourceError) -> Self {
        Self::new(item, None, Some(cause))
    }
}

impl<I: PartialEq> PreloadError<I> {
    /// Whether two errors stem from the same root cause.
    ///
    /// Used to collapse repeated failures of one item: items must match and
    /// the causes must agree on kind and message (or both be absent).
    pub fn is_same_root_cause(&self, other: &Self) -> bool {
        if self.item != other.item {
            return false;
        }
        match (&self.cause, &other.cause) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_kind(b) && a.message() == b.message(),
            _ => false,
        }
    }
}

impl<I: fmt::Debug> fmt::Display for PreloadError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preload failed for {:?}", self.item)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

impl<I: fmt::Debug> std::error::Error for PreloadError<I> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Errors raised by the scheduler and its bindings.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler has been released")]
    Released,

    #[error("Failed to spawn preload worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("Preload worker is no longer accepting jobs")]
    WorkerUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn same_root_cause_requires_matching_item() {
        let a = PreloadError::from_cause("a", SourceError::Network("timeout".into()));
        let b = PreloadError::from_cause("b", SourceError::Network("timeout".into()));
        assert!(!a.is_same_root_cause(&b));
    }

    #[test]
    fn same_root_cause_compares_kind_and_message() {
        let a = PreloadError::from_cause(1, SourceError::Network("timeout".into()));
        let cause = SourceError::Network("timeout".into());
        let same = PreloadError::new(1, Some("retry 2".into()), Some(cause));
        let other_kind = PreloadError::from_cause(1, SourceError::Io("timeout".into()));
        let other_message = PreloadError::from_cause(1, SourceError::Network("reset".into()));

        assert!(a.is_same_root_cause(&same));
        assert!(!a.is_same_root_cause(&other_kind));
        assert!(!a.is_same_root_cause(&other_message));
    }

    #[test]
    fn missing_causes_match_only_each_other() {
        let none = PreloadError::<u32>::new(7, Some("x".into()), None);
        let also_none = PreloadError::<u32>::new(7, None, None);
        let some = PreloadError::from_cause(7, SourceError::Other("x".into()));
        assert!(none.is_same_root_cause(&also_none));
        assert!(!none.is_same_root_cause(&some));
    }

    #[test]
    fn display_includes_message_and_cause() {
        let cause = SourceError::Parse("bad box".into());
        let err = PreloadError::new("clip-3", Some("segment 4".into()), Some(cause));
        let text = err.to_string();
        assert!(text.contains("clip-3"));
        assert!(text.contains("segment 4"));
        assert!(text.contains("bad box"));
        assert!(err.source().is_some());
    }
}
