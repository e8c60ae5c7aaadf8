//! Per-fingerprint entry sets and the query matching predicate.
//!
//! One structure exists per `(payload type, fingerprint)` pair. A fingerprint
//! corresponds to one operator-graph shape, so the entries of a structure
//! differ only in their spatio-temporal extent and resolution; the typical
//! cardinality is small and lookups are a linear scan returning the first
//! match.

use crate::datatypes::QueryRect;

use super::types::CachePayload;

/// An immutable cached result plus its accounting metadata.
#[derive(Debug)]
pub(crate) struct CacheEntry<P> {
    /// Store-unique id; the eviction policy refers to entries by this.
    pub id: u64,
    pub payload: P,
    pub size: u64,
}

/// The entry set of one fingerprint.
///
/// Created lazily on the first insert and dropped by the store once eviction
/// empties it.
pub(crate) struct CacheStructure<P> {
    entries: Vec<CacheEntry<P>>,
}

impl<P: CachePayload> CacheStructure<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, entry: CacheEntry<P>) {
        self.entries.push(entry);
    }

    /// First entry satisfying the query, in insertion order.
    pub fn query(&self, query: &QueryRect) -> Option<&CacheEntry<P>> {
        self.entries.iter().find(|e| matches(&e.payload, query))
    }

    pub fn remove(&mut self, entry_id: u64) -> Option<CacheEntry<P>> {
        let pos = self.entries.iter().position(|e| e.id == entry_id)?;
        Some(self.entries.remove(pos))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Whether a cached payload satisfies a query.
///
/// The entry must share the query's CRS, spatially contain the query
/// rectangle within a tolerance of a hundredth of a pixel, temporally contain
/// the query instant, and (for rasters) cover the query at between 1x and 2x
/// the requested resolution, so a hit never has to be scaled by more than a
/// factor of two.
pub(crate) fn matches<P: CachePayload>(payload: &P, query: &QueryRect) -> bool {
    let entry = payload.stref();
    let q = &query.stref;

    if q.crs != entry.crs {
        return false;
    }

    let (h_tol, v_tol) = match payload.resolution() {
        Some((width, height)) => (
            (entry.x2 - entry.x1) / width as f64 / 100.0,
            (entry.y2 - entry.y1) / height as f64 / 100.0,
        ),
        None => (0.0, 0.0),
    };

    if q.x1 < entry.x1 - h_tol
        || q.x2 > entry.x2 + h_tol
        || q.y1 < entry.y1 - v_tol
        || q.y2 > entry.y2 + v_tol
    {
        return false;
    }

    if !entry.contains_instant(query.timestamp()) {
        return false;
    }

    // Resolution compatibility applies only when both sides carry one.
    if let (Some((width, height)), Some(res)) = (payload.resolution(), query.resolution) {
        let h_factor = (q.x2 - q.x1) / (entry.x2 - entry.x1);
        let v_factor = (q.y2 - q.y1) / (entry.y2 - entry.y1);

        let clip_width = width as f64 * h_factor;
        let clip_height = height as f64 * v_factor;

        return clip_width >= res.x as f64
            && clip_height >= res.y as f64
            && clip_width < 2.0 * res.x as f64
            && clip_height < 2.0 * res.y as f64;
    }

    true
}
