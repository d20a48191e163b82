//! Preload priority queue.
//!
//! Rebuilt wholesale on every `invalidate()` and consumed head-first. Ordering
//! is a stable sort, so ties keep the order entries were supplied in.

use std::cmp::Ordering;
use std::collections::VecDeque;

/// Priority-ordered candidates, best first.
#[derive(Debug)]
pub struct PreloadQueue<T> {
    entries: VecDeque<T>,
}

impl<T> PreloadQueue<T> {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Replace the contents with `items`, ordered by `compare`.
    pub fn rebuild<F>(&mut self, items: impl IntoIterator<Item = T>, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut sorted: Vec<T> = items.into_iter().collect();
        sorted.sort_by(|a, b| compare(a, b));
        self.entries = sorted.into();
    }

    pub fn peek(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    /// Drop every entry matching `predicate`. Returns how many were dropped.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|e| !predicate(e));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T> Default for PreloadQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuild_orders_by_comparator() {
        let mut queue = PreloadQueue::new();
        queue.rebuild(vec![5, 1, 3], |a, b| a.cmp(b));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(5));
        assert!(queue.is_empty());
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let mut queue = PreloadQueue::new();
        queue.rebuild(vec![9, 8], |a, b| a.cmp(b));
        queue.rebuild(vec![2], |a, b| a.cmp(b));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek(), Some(&2));
    }

    #[test]
    fn ties_keep_supplied_order() {
        let mut queue = PreloadQueue::new();
        queue.rebuild(vec![("first", 1), ("second", 1), ("third", 0)], |a, b| a.1.cmp(&b.1));
        let order: Vec<_> = queue.iter().map(|e| e.0).collect();
        assert_eq!(order, vec!["third", "first", "second"]);
    }

    #[test]
    fn remove_where_keeps_order() {
        let mut queue = PreloadQueue::new();
        queue.rebuild(vec![1, 2, 3, 4], |a, b| a.cmp(b));
        assert_eq!(queue.remove_where(|v| v % 2 == 0), 2);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }
}
