//! The typed, size-bounded entry store.
//!
//! One store exists per payload type. It owns the fingerprint → structure
//! map, the byte accounting and the eviction policy, all behind a single
//! mutex: payload copies for hits are taken while the lock is held so the
//! source entry cannot be evicted mid-copy.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::datatypes::QueryRect;

use super::policy::{create_policy, EntryHandle, EvictionPolicy};
use super::structure::{CacheEntry, CacheStructure};
use super::types::{CachePayload, Replacement};

/// Hit/miss/eviction counters of one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Size-bounded cache for one payload type.
pub struct CacheStore<P: CachePayload> {
    /// Payload type name, for logs.
    label: &'static str,
    inner: Mutex<Inner<P>>,
}

struct Inner<P> {
    structures: HashMap<String, CacheStructure<P>>,
    policy: Box<dyn EvictionPolicy>,
    current_bytes: u64,
    max_bytes: u64,
    next_entry_id: u64,
    stats: StoreStats,
}

impl<P: CachePayload> CacheStore<P> {
    pub fn new(label: &'static str, max_bytes: u64, replacement: Replacement) -> Self {
        Self {
            label,
            inner: Mutex::new(Inner {
                structures: HashMap::new(),
                policy: create_policy(replacement),
                current_bytes: 0,
                max_bytes,
                next_entry_id: 0,
                stats: StoreStats::default(),
            }),
        }
    }

    /// Look up an entry covering the query.
    ///
    /// Returns an independent copy of the payload; the eviction policy is
    /// notified of the access.
    pub fn get(&self, semantic_id: &str, query: &QueryRect) -> Option<P> {
        let mut inner = self.inner.lock().unwrap();

        let hit = inner
            .structures
            .get(semantic_id)
            .and_then(|s| s.query(query))
            .map(|entry| (entry.id, entry.payload.clone()));

        match hit {
            Some((entry_id, payload)) => {
                inner.policy.accessed(entry_id);
                inner.stats.hits += 1;
                info!(cache = self.label, %query, "HIT for \"{semantic_id}\"");
                Some(payload)
            }
            None => {
                inner.stats.misses += 1;
                info!(cache = self.label, %query, "MISS for \"{semantic_id}\"");
                None
            }
        }
    }

    /// Insert a fresh entry, evicting victims until the budget holds.
    ///
    /// A payload larger than the whole budget is dropped with a warning; the
    /// store stays consistent.
    pub fn put(&self, semantic_id: &str, item: &P) {
        let size = item.size_bytes();
        let mut inner = self.inner.lock().unwrap();

        if size > inner.max_bytes {
            warn!(
                cache = self.label,
                size,
                max_bytes = inner.max_bytes,
                "entry exceeds the cache budget, not inserting"
            );
            return;
        }

        while inner.current_bytes + size > inner.max_bytes {
            let handle = inner.policy.evict();
            let victim = inner
                .structures
                .get_mut(&handle.semantic_id)
                .and_then(|s| s.remove(handle.entry_id))
                .unwrap_or_else(|| {
                    panic!(
                        "eviction policy returned unknown entry {} of \"{}\"",
                        handle.entry_id, handle.semantic_id
                    )
                });
            inner.current_bytes -= victim.size;
            inner.stats.evictions += 1;
            info!(
                cache = self.label,
                bytes = victim.size,
                stref = %victim.payload.stref(),
                "evicting entry of \"{}\"",
                handle.semantic_id
            );
            if inner.structures[&handle.semantic_id].is_empty() {
                inner.structures.remove(&handle.semantic_id);
            }
        }

        let entry_id = inner.next_entry_id;
        inner.next_entry_id += 1;
        inner
            .structures
            .entry(semantic_id.to_string())
            .or_insert_with(CacheStructure::new)
            .insert(CacheEntry {
                id: entry_id,
                payload: item.clone(),
                size,
            });
        inner.policy.inserted(EntryHandle {
            semantic_id: semantic_id.to_string(),
            entry_id,
        });
        inner.current_bytes += size;
        debug!(
            cache = self.label,
            size,
            current_bytes = inner.current_bytes,
            "inserted entry for \"{semantic_id}\""
        );
    }

    pub fn current_bytes(&self) -> u64 {
        self.inner.lock().unwrap().current_bytes
    }

    pub fn max_bytes(&self) -> u64 {
        self.inner.lock().unwrap().max_bytes
    }

    /// Live entries across all fingerprints.
    pub fn entry_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .structures
            .values()
            .map(|s| s.len())
            .sum()
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.lock().unwrap().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{
        Crs, DataType, Raster, Resolution, SpatioTemporalRef, TimeKind,
    };

    fn stref(x1: f64, x2: f64) -> SpatioTemporalRef {
        SpatioTemporalRef::new(
            Crs::WEB_MERCATOR,
            x1,
            0.0,
            x2,
            100.0,
            TimeKind::Unix,
            0.0,
            10.0,
        )
        .unwrap()
    }

    fn raster(x1: f64, x2: f64) -> Raster {
        Raster::zeroed(stref(x1, x2), 10, 10, 1, DataType::U8, None).unwrap()
    }

    fn query(x1: f64, x2: f64) -> QueryRect {
        QueryRect::new(
            SpatioTemporalRef::new(
                Crs::WEB_MERCATOR,
                x1,
                0.0,
                x2,
                100.0,
                TimeKind::Unix,
                5.0,
                5.0,
            )
            .unwrap(),
            Some(Resolution { x: 10, y: 10 }),
        )
    }

    fn store(max: u64) -> CacheStore<Raster> {
        CacheStore::new("raster", max, Replacement::Lru)
    }

    #[test]
    fn get_returns_independent_copy() {
        let store = store(1_000_000);
        let original = raster(0.0, 100.0);
        store.put("ndvi", &original);

        let copy = store.get("ndvi", &query(0.0, 100.0)).unwrap();
        assert_eq!(copy.data, original.data);

        // The copy is independent; the cached entry is unchanged.
        let again = store.get("ndvi", &query(0.0, 100.0)).unwrap();
        assert_eq!(again.data, original.data);
    }

    #[test]
    fn miss_on_unknown_fingerprint() {
        let store = store(1_000_000);
        assert!(store.get("unknown", &query(0.0, 100.0)).is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn byte_accounting_matches_live_entries() {
        let store = store(1_000_000);
        let item = raster(0.0, 100.0);
        let size = item.size_bytes();

        store.put("a", &item);
        store.put("b", &item);
        assert_eq!(store.current_bytes(), 2 * size);
        assert_eq!(store.entry_count(), 2);
    }

    #[test]
    fn put_is_not_deduplicated() {
        // Two identical puts double the accounted bytes.
        let store = store(1_000_000);
        let item = raster(0.0, 100.0);

        store.put("a", &item);
        store.put("a", &item);
        assert_eq!(store.current_bytes(), 2 * item.size_bytes());
    }

    #[test]
    fn oversized_put_is_dropped() {
        let item = raster(0.0, 100.0);
        let store = store(item.size_bytes() - 1);

        store.put("a", &item);
        assert_eq!(store.current_bytes(), 0);
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn eviction_respects_lru_order() {
        let item = raster(0.0, 100.0);
        let size = item.size_bytes();
        let store = store(2 * size + 1);

        store.put("a", &item);
        store.put("b", &item);
        // Access A so B becomes the LRU victim.
        assert!(store.get("a", &query(0.0, 100.0)).is_some());

        store.put("c", &item);

        assert!(store.get("a", &query(0.0, 100.0)).is_some());
        assert!(store.get("b", &query(0.0, 100.0)).is_none());
        assert!(store.get("c", &query(0.0, 100.0)).is_some());
        assert!(store.current_bytes() <= store.max_bytes());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn empty_structures_are_dropped_after_eviction() {
        let item = raster(0.0, 100.0);
        let size = item.size_bytes();
        let store = store(size + 1);

        store.put("a", &item);
        store.put("b", &item); // evicts the only entry of "a"

        assert_eq!(store.entry_count(), 1);
        assert!(store.get("a", &query(0.0, 100.0)).is_none());
        let inner = store.inner.lock().unwrap();
        assert!(!inner.structures.contains_key("a"));
    }

    #[test]
    fn lookup_distinguishes_extents_within_one_fingerprint() {
        let store = store(1_000_000);
        store.put("ndvi", &raster(0.0, 100.0));
        store.put("ndvi", &raster(100.0, 200.0));

        let west = store.get("ndvi", &query(0.0, 100.0)).unwrap();
        assert_eq!(west.stref.x1, 0.0);
        let east = store.get("ndvi", &query(100.0, 200.0)).unwrap();
        assert_eq!(east.stref.x1, 100.0);
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let store = store(1_000_000);
        store.put("a", &raster(0.0, 100.0));

        store.get("a", &query(0.0, 100.0));
        store.get("a", &query(0.0, 100.0));
        store.get("missing", &query(0.0, 100.0));

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }
}
