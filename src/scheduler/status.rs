//! Target preload status and the policy that produces it.

/// Lifecycle milestones a resource can be preloaded to, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreloadStage {
    /// The resource has completed preparation.
    SourcePrepared = 0,
    /// Tracks have been selected for the resource.
    TracksSelected = 1,
    /// Media is loaded for a duration from the start position, in milliseconds.
    LoadedForDurationMs = 2,
}

/// How far a resource should be preloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadStatus {
    pub stage: PreloadStage,
    /// Stage-specific payload. Only `LoadedForDurationMs` uses it.
    pub value: Option<u64>,
}

impl PreloadStatus {
    pub fn new(stage: PreloadStage) -> Self {
        Self { stage, value: None }
    }

    pub fn source_prepared() -> Self {
        Self::new(PreloadStage::SourcePrepared)
    }

    pub fn tracks_selected() -> Self {
        Self::new(PreloadStage::TracksSelected)
    }

    pub fn loaded_for_duration_ms(duration_ms: u64) -> Self {
        Self { stage: PreloadStage::LoadedForDurationMs, value: Some(duration_ms) }
    }
}

/// Maps a ranking key to a target status, or `None` to skip the resource.
///
/// Called with the scheduler lock held: implementations must not block or
/// call back into the scheduler.
pub trait TargetStatusPolicy<K>: Send + Sync {
    fn target_status(&self, key: &K) -> Option<PreloadStatus>;
}

impl<K, F> TargetStatusPolicy<K> for F
where
    F: Fn(&K) -> Option<PreloadStatus> + Send + Sync,
{
    fn target_status(&self, key: &K) -> Option<PreloadStatus> {
        self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_totally_ordered() {
        assert!(PreloadStage::SourcePrepared < PreloadStage::TracksSelected);
        assert!(PreloadStage::TracksSelected < PreloadStage::LoadedForDurationMs);
    }

    #[test]
    fn duration_status_carries_value() {
        let status = PreloadStatus::loaded_for_duration_ms(500);
        assert_eq!(status.stage, PreloadStage::LoadedForDurationMs);
        assert_eq!(status.value, Some(500));
        assert_eq!(PreloadStatus::tracks_selected().value, None);
    }

    #[test]
    fn closure_policy() {
        let policy = |key: &i64| (*key < 3).then(PreloadStatus::source_prepared);
        assert!(policy.target_status(&1).is_some());
        assert!(policy.target_status(&3).is_none());
    }
}
