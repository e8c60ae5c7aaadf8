//! The cache manager façade and its local and no-op implementations.
//!
//! Operators interact with one process-wide [`CacheManager`] installed via
//! [`crate::cache::init`]. The manager exposes one typed wrapper per payload
//! type; every wrapper has the same `get`/`put` shape.

use tracing::debug;

use crate::config::Settings;
use crate::datatypes::{
    LineCollection, Plot, PointCollection, PolygonCollection, QueryRect, Raster,
};

use super::store::CacheStore;
use super::types::{CachePayload, CacheType};

/// Gate on `put`: `Never` turns the cache into a read-only layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachingStrategy {
    #[default]
    Always,
    Never,
}

impl CachingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachingStrategy::Always => "always",
            CachingStrategy::Never => "never",
        }
    }
}

impl std::str::FromStr for CachingStrategy {
    type Err = super::types::CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(CachingStrategy::Always),
            "never" => Ok(CachingStrategy::Never),
            other => Err(super::types::CacheError::Argument(format!(
                "unknown caching strategy '{other}', expected always or never"
            ))),
        }
    }
}

/// Typed access to one payload cache.
pub trait CacheWrapper<P>: Send + Sync {
    /// A fresh copy of a matching entry, or `None` on a miss. Misses are
    /// never an error; the caller computes the result and offers it back
    /// via [`CacheWrapper::put`].
    fn get(&self, semantic_id: &str, query: &QueryRect) -> Option<P>;

    /// Offer a computed result to the cache. Returns whether it was stored.
    fn put(&self, semantic_id: &str, item: &P) -> bool;
}

/// Per-type cache access, the consumer API of the whole cache.
pub trait CacheManager: Send + Sync {
    fn raster_cache(&self) -> &dyn CacheWrapper<Raster>;
    fn point_cache(&self) -> &dyn CacheWrapper<PointCollection>;
    fn line_cache(&self) -> &dyn CacheWrapper<LineCollection>;
    fn polygon_cache(&self) -> &dyn CacheWrapper<PolygonCollection>;
    fn plot_cache(&self) -> &dyn CacheWrapper<Plot>;
}

/// Store-backed wrapper used by the local manager.
pub struct LocalCacheWrapper<P: CachePayload> {
    store: CacheStore<P>,
    strategy: CachingStrategy,
}

impl<P: CachePayload> LocalCacheWrapper<P> {
    fn new(store: CacheStore<P>, strategy: CachingStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn store(&self) -> &CacheStore<P> {
        &self.store
    }
}

impl<P: CachePayload> CacheWrapper<P> for LocalCacheWrapper<P> {
    fn get(&self, semantic_id: &str, query: &QueryRect) -> Option<P> {
        self.store.get(semantic_id, query)
    }

    fn put(&self, semantic_id: &str, item: &P) -> bool {
        if self.strategy == CachingStrategy::Never {
            debug!("caching strategy is 'never', discarding entry for \"{semantic_id}\"");
            return false;
        }
        self.store.put(semantic_id, item);
        true
    }
}

/// In-process cache holding one store per payload type.
pub struct LocalCacheManager {
    raster: LocalCacheWrapper<Raster>,
    points: LocalCacheWrapper<PointCollection>,
    lines: LocalCacheWrapper<LineCollection>,
    polygons: LocalCacheWrapper<PolygonCollection>,
    plots: LocalCacheWrapper<Plot>,
}

impl LocalCacheManager {
    pub fn new(settings: &Settings) -> Self {
        let c = &settings.cache;
        let strategy = c.strategy;
        let replacement = c.replacement;
        Self {
            raster: LocalCacheWrapper::new(
                CacheStore::new(CacheType::Raster.as_str(), c.raster_size, replacement),
                strategy,
            ),
            points: LocalCacheWrapper::new(
                CacheStore::new(CacheType::Points.as_str(), c.points_size, replacement),
                strategy,
            ),
            lines: LocalCacheWrapper::new(
                CacheStore::new(CacheType::Lines.as_str(), c.lines_size, replacement),
                strategy,
            ),
            polygons: LocalCacheWrapper::new(
                CacheStore::new(CacheType::Polygons.as_str(), c.polygons_size, replacement),
                strategy,
            ),
            plots: LocalCacheWrapper::new(
                CacheStore::new(CacheType::Plots.as_str(), c.plots_size, replacement),
                strategy,
            ),
        }
    }

    pub fn raster_store(&self) -> &CacheStore<Raster> {
        self.raster.store()
    }
}

impl CacheManager for LocalCacheManager {
    fn raster_cache(&self) -> &dyn CacheWrapper<Raster> {
        &self.raster
    }

    fn point_cache(&self) -> &dyn CacheWrapper<PointCollection> {
        &self.points
    }

    fn line_cache(&self) -> &dyn CacheWrapper<LineCollection> {
        &self.lines
    }

    fn polygon_cache(&self) -> &dyn CacheWrapper<PolygonCollection> {
        &self.polygons
    }

    fn plot_cache(&self) -> &dyn CacheWrapper<Plot> {
        &self.plots
    }
}

/// Wrapper that never stores and never hits.
pub struct NopCacheWrapper<P> {
    _marker: std::marker::PhantomData<fn() -> P>,
}

impl<P> NopCacheWrapper<P> {
    fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<P: CachePayload> CacheWrapper<P> for NopCacheWrapper<P> {
    fn get(&self, _semantic_id: &str, _query: &QueryRect) -> Option<P> {
        None
    }

    fn put(&self, _semantic_id: &str, _item: &P) -> bool {
        false
    }
}

/// Manager installed when caching is disabled: every lookup misses, every
/// insert is discarded.
pub struct NopCacheManager {
    raster: NopCacheWrapper<Raster>,
    points: NopCacheWrapper<PointCollection>,
    lines: NopCacheWrapper<LineCollection>,
    polygons: NopCacheWrapper<PolygonCollection>,
    plots: NopCacheWrapper<Plot>,
}

impl NopCacheManager {
    pub fn new() -> Self {
        Self {
            raster: NopCacheWrapper::new(),
            points: NopCacheWrapper::new(),
            lines: NopCacheWrapper::new(),
            polygons: NopCacheWrapper::new(),
            plots: NopCacheWrapper::new(),
        }
    }
}

impl Default for NopCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager for NopCacheManager {
    fn raster_cache(&self) -> &dyn CacheWrapper<Raster> {
        &self.raster
    }

    fn point_cache(&self) -> &dyn CacheWrapper<PointCollection> {
        &self.points
    }

    fn line_cache(&self) -> &dyn CacheWrapper<LineCollection> {
        &self.lines
    }

    fn polygon_cache(&self) -> &dyn CacheWrapper<PolygonCollection> {
        &self.polygons
    }

    fn plot_cache(&self) -> &dyn CacheWrapper<Plot> {
        &self.plots
    }
}
