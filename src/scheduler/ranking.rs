//! Ranking of registered resources.
//!
//! A comparator orders two ranking keys under a caller-owned context. The
//! context is handed to `invalidate()` explicitly, so the comparator itself
//! carries no mutable state.

use std::cmp::Ordering;

/// Orders ranking keys. `Ordering::Less` means `a` preloads before `b`.
pub trait RankingComparator<K, C>: Send + Sync {
    fn compare(&self, a: &K, b: &K, ctx: &C) -> Ordering;
}

impl<K, C, F> RankingComparator<K, C> for F
where
    F: Fn(&K, &K, &C) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &K, b: &K, ctx: &C) -> Ordering {
        self(a, b, ctx)
    }
}

/// Index of the item currently being played, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackPosition {
    current_index: Option<i64>,
}

impl PlaybackPosition {
    /// No item is playing.
    pub fn unset() -> Self {
        Self { current_index: None }
    }

    pub fn at(index: i64) -> Self {
        Self { current_index: Some(index) }
    }

    pub fn current_index(&self) -> Option<i64> {
        self.current_index
    }
}

/// Ranks integer keys by distance from the current playback index.
///
/// With no current index, keys rank in ascending order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceComparator;

impl DistanceComparator {
    fn distance(key: i64, current: i64) -> u64 {
        key.abs_diff(current)
    }
}

impl RankingComparator<i64, PlaybackPosition> for DistanceComparator {
    fn compare(&self, a: &i64, b: &i64, ctx: &PlaybackPosition) -> Ordering {
        match ctx.current_index {
            Some(current) => Self::distance(*a, current).cmp(&Self::distance(*b, current)),
            None => a.cmp(b),
        }
    }
}

/// Ranks keys by their natural order, ignoring any context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<K: Ord, C> RankingComparator<K, C> for NaturalOrder {
    fn compare(&self, a: &K, b: &K, _ctx: &C) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_prefers_nearest_key() {
        let cmp = DistanceComparator;
        let ctx = PlaybackPosition::at(0);
        let mut keys = vec![5, 1, 3];
        keys.sort_by(|a, b| cmp.compare(a, b, &ctx));
        assert_eq!(keys, vec![1, 3, 5]);
    }

    #[test]
    fn distance_is_symmetric_around_current() {
        let cmp = DistanceComparator;
        let ctx = PlaybackPosition::at(4);
        assert_eq!(cmp.compare(&3, &5, &ctx), Ordering::Equal);
        assert_eq!(cmp.compare(&4, &2, &ctx), Ordering::Less);
        assert_eq!(cmp.compare(&0, &6, &ctx), Ordering::Greater);
    }

    #[test]
    fn negative_keys_measure_distance_across_zero() {
        let cmp = DistanceComparator;
        let ctx = PlaybackPosition::at(-2);
        assert_eq!(DistanceComparator::distance(3, -2), 5);
        assert_eq!(cmp.compare(&-4, &1, &ctx), Ordering::Less);
        assert_eq!(cmp.compare(&i64::MIN, &i64::MAX, &PlaybackPosition::at(0)), Ordering::Greater);
    }

    #[test]
    fn unset_position_sorts_ascending() {
        let cmp = DistanceComparator;
        let ctx = PlaybackPosition::unset();
        assert_eq!(cmp.compare(&2, &7, &ctx), Ordering::Less);
        assert_eq!(cmp.compare(&7, &2, &ctx), Ordering::Greater);
    }

    #[test]
    fn closures_act_as_comparators() {
        let reverse = |a: &u32, b: &u32, _: &()| b.cmp(a);
        assert_eq!(RankingComparator::compare(&reverse, &1, &2, &()), Ordering::Greater);
    }
}
