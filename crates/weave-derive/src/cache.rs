//! Per-request memo of resolved capability references.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::knot::Binding;
use crate::ty::Ty;

/// Type → resolved binding, or `None` for a type that failed.
///
/// Write-once per key: a type's capability is derived or looked up at most
/// once per request, and every later request for it sees the same binding.
/// The one exception is [`evict_found_since`](Self::evict_found_since): a
/// success derived while some enclosing type was still on the stack may
/// hold a placeholder for it, and is dropped if that enclosing type fails.
pub struct ResolutionCache<I> {
    entries: FxHashMap<Ty, Option<Binding<I>>>,
    /// Keys in insertion order.
    order: Vec<Ty>,
}

impl<I> Default for ResolutionCache<I> {
    fn default() -> Self {
        ResolutionCache {
            entries: FxHashMap::default(),
            order: Vec::new(),
        }
    }
}

impl<I> ResolutionCache<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(None)` is a cached failure; `None` means never resolved.
    pub fn get(&self, ty: &Ty) -> Option<Option<&Binding<I>>> {
        self.entries.get(ty).map(Option::as_ref)
    }

    /// Record the outcome for `ty`. A second write for the same key is
    /// ignored and the first value kept; returns whether the write happened.
    pub fn insert(&mut self, ty: &Ty, binding: Option<Binding<I>>) -> bool {
        if self.entries.contains_key(ty) {
            debug!(ty = %ty, "ignoring second cache write");
            return false;
        }
        self.entries.insert(ty.clone(), binding);
        self.order.push(ty.clone());
        true
    }

    /// A position in the write history, for [`evict_found_since`](Self::evict_found_since).
    pub fn mark(&self) -> usize {
        self.order.len()
    }

    /// Forget every success written after `mark`. Cached failures stay: a
    /// failure never depends on a placeholder. Returns how many were evicted.
    pub fn evict_found_since(&mut self, mark: usize) -> usize {
        let Some(written) = self.order.get(mark..) else {
            return 0;
        };
        let mut kept = Vec::with_capacity(written.len());
        let mut evicted = 0;
        for ty in written.to_vec() {
            if matches!(self.entries.get(&ty), Some(Some(_))) {
                self.entries.remove(&ty);
                evicted += 1;
            } else {
                kept.push(ty);
            }
        }
        self.order.truncate(mark);
        self.order.extend(kept);
        if evicted > 0 {
            debug!(evicted, "evicted results that depended on a failed type");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knot::BindingName;

    #[test]
    fn write_once() {
        let mut cache = ResolutionCache::new();
        let first = Binding::ready(BindingName(1), "first");
        let second = Binding::ready(BindingName(2), "second");

        assert!(cache.insert(&Ty::string(), Some(first)));
        assert!(!cache.insert(&Ty::string(), Some(second)));

        let hit = cache.get(&Ty::string()).unwrap().unwrap();
        assert_eq!(hit.name(), BindingName(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_drops_later_successes_only() {
        let mut cache = ResolutionCache::new();
        cache.insert(&Ty::int(), Some(Binding::ready(BindingName(1), 1u8)));
        let mark = cache.mark();
        cache.insert(&Ty::con("Ya"), Some(Binding::ready(BindingName(2), 2u8)));
        cache.insert(&Ty::con("Mystery"), None);
        cache.insert(&Ty::list(Ty::con("Xa")), Some(Binding::ready(BindingName(3), 3u8)));

        assert_eq!(cache.evict_found_since(mark), 2);
        assert!(cache.get(&Ty::int()).is_some());
        assert!(cache.get(&Ty::con("Ya")).is_none());
        assert!(matches!(cache.get(&Ty::con("Mystery")), Some(None)));
        assert!(cache.get(&Ty::list(Ty::con("Xa"))).is_none());
        assert_eq!(cache.len(), 2);

        // An evicted key can be written again.
        assert!(cache.insert(&Ty::con("Ya"), None));
        assert_eq!(cache.mark(), 3);
    }

    #[test]
    fn cached_failure_is_distinct_from_miss() {
        let mut cache: ResolutionCache<u8> = ResolutionCache::new();
        assert!(cache.get(&Ty::int()).is_none());
        cache.insert(&Ty::int(), None);
        assert!(matches!(cache.get(&Ty::int()), Some(None)));
    }
}
