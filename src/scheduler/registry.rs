//! Registry of preloadable resources.
//!
//! Resources live in an arena keyed by a generated `ResourceHandle`; a
//! separate table maps item identity to the live handle. Handles are never
//! reused, so a signal from a removed or replaced resource can never be
//! mistaken for one from its successor.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

/// Unique handle to a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A registered resource together with its ranking data.
pub struct ResourceHolder<I, K, R> {
    pub item: I,
    pub resource: Arc<R>,
    pub ranking_key: K,
    /// Where preloading should begin; `None` uses the resource's natural start.
    pub start_position_us: Option<i64>,
}

/// Arena of resource holders plus the identity lookup table.
pub struct ResourceRegistry<I, K, R> {
    slots: BTreeMap<ResourceHandle, ResourceHolder<I, K, R>>,
    index: HashMap<I, ResourceHandle>,
    next_id: u64,
}

impl<I, K, R> ResourceRegistry<I, K, R>
where
    I: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self { slots: BTreeMap::new(), index: HashMap::new(), next_id: 1 }
    }

    /// Reserve the handle the next inserted resource will receive.
    pub fn next_handle(&mut self) -> ResourceHandle {
        let handle = ResourceHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    /// Store a holder under `handle`. Returns the holder it displaced for the
    /// same item, if any; the caller owns releasing it.
    pub fn insert(
        &mut self,
        handle: ResourceHandle,
        holder: ResourceHolder<I, K, R>,
    ) -> Option<(ResourceHandle, ResourceHolder<I, K, R>)> {
        let previous = self
            .index
            .insert(holder.item.clone(), handle)
            .and_then(|old| self.slots.remove(&old).map(|h| (old, h)));
        self.slots.insert(handle, holder);
        previous
    }

    /// Remove the holder registered for `item`.
    pub fn remove(&mut self, item: &I) -> Option<(ResourceHandle, ResourceHolder<I, K, R>)> {
        let handle = self.index.remove(item)?;
        self.slots.remove(&handle).map(|h| (handle, h))
    }

    pub fn handle_of(&self, item: &I) -> Option<ResourceHandle> {
        self.index.get(item).copied()
    }

    pub fn get(&self, handle: ResourceHandle) -> Option<&ResourceHolder<I, K, R>> {
        self.slots.get(&handle)
    }

    pub fn resource_for(&self, item: &I) -> Option<Arc<R>> {
        let handle = self.handle_of(item)?;
        self.slots.get(&handle).map(|h| Arc::clone(&h.resource))
    }

    /// Holders in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceHandle, &ResourceHolder<I, K, R>)> {
        self.slots.iter().map(|(h, holder)| (*h, holder))
    }

    /// Empty the registry, handing back every holder.
    pub fn drain(&mut self) -> Vec<ResourceHolder<I, K, R>> {
        self.index.clear();
        std::mem::take(&mut self.slots).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<I, K, R> Default for ResourceRegistry<I, K, R>
where
    I: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
