//! Core types and traits for the cache system.

use std::str::FromStr;

use thiserror::Error;

use crate::datatypes::{
    LineCollection, Plot, PointCollection, PolygonCollection, Raster, SpatioTemporalRef,
};
use crate::wire::WireError;

/// Cache-related errors. A miss is not an error; lookups return `Option`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The process-wide manager was used before `cache::init`.
    #[error("cache manager was not initialized, call cache::init first")]
    NotInitialized,

    /// `cache::init` was called twice.
    #[error("cache manager was already initialized")]
    AlreadyInitialized,

    /// Invalid argument or configuration value.
    #[error("invalid argument: {0}")]
    Argument(String),
}

/// The payload type a cache, request or wire message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    Raster,
    Points,
    Lines,
    Polygons,
    Plots,
}

impl CacheType {
    pub fn to_wire_code(self) -> u8 {
        match self {
            CacheType::Raster => 0,
            CacheType::Points => 1,
            CacheType::Lines => 2,
            CacheType::Polygons => 3,
            CacheType::Plots => 4,
        }
    }

    pub fn from_wire_code(code: u8) -> Result<Self, WireError> {
        match code {
            0 => Ok(CacheType::Raster),
            1 => Ok(CacheType::Points),
            2 => Ok(CacheType::Lines),
            3 => Ok(CacheType::Polygons),
            4 => Ok(CacheType::Plots),
            other => Err(WireError::Protocol(format!("unknown cache type {other}"))),
        }
    }

    /// Name used in logs and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Raster => "raster",
            CacheType::Points => "points",
            CacheType::Lines => "lines",
            CacheType::Polygons => "polygons",
            CacheType::Plots => "plots",
        }
    }
}

/// Eviction order used by a cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Replacement {
    #[default]
    Lru,
    Lfu,
    Fifo,
}

impl Replacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Replacement::Lru => "lru",
            Replacement::Lfu => "lfu",
            Replacement::Fifo => "fifo",
        }
    }
}

impl FromStr for Replacement {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lru" => Ok(Replacement::Lru),
            "lfu" => Ok(Replacement::Lfu),
            "fifo" => Ok(Replacement::Fifo),
            other => Err(CacheError::Argument(format!(
                "unknown replacement policy '{other}', expected lru, lfu or fifo"
            ))),
        }
    }
}

/// Behavior every cacheable payload provides.
///
/// The set of payload types is closed; the trait exists so the entry store,
/// structures and eviction machinery can treat them uniformly.
pub trait CachePayload: Clone + Send + 'static {
    /// Payload size for byte accounting.
    fn size_bytes(&self) -> u64;

    /// The spatio-temporal reference of the stored result.
    fn stref(&self) -> &SpatioTemporalRef;

    /// Pixel dimensions for resolution matching; `None` for vector payloads.
    fn resolution(&self) -> Option<(u32, u32)>;
}

impl CachePayload for Raster {
    fn size_bytes(&self) -> u64 {
        Raster::size_bytes(self)
    }

    fn stref(&self) -> &SpatioTemporalRef {
        &self.stref
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

impl CachePayload for PointCollection {
    fn size_bytes(&self) -> u64 {
        PointCollection::size_bytes(self)
    }

    fn stref(&self) -> &SpatioTemporalRef {
        &self.base.stref
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}

impl CachePayload for LineCollection {
    fn size_bytes(&self) -> u64 {
        LineCollection::size_bytes(self)
    }

    fn stref(&self) -> &SpatioTemporalRef {
        &self.base.stref
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}

impl CachePayload for PolygonCollection {
    fn size_bytes(&self) -> u64 {
        PolygonCollection::size_bytes(self)
    }

    fn stref(&self) -> &SpatioTemporalRef {
        &self.base.stref
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}

impl CachePayload for Plot {
    fn size_bytes(&self) -> u64 {
        Plot::size_bytes(self)
    }

    fn stref(&self) -> &SpatioTemporalRef {
        &self.stref
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_type_wire_codes_roundtrip() {
        for t in [
            CacheType::Raster,
            CacheType::Points,
            CacheType::Lines,
            CacheType::Polygons,
            CacheType::Plots,
        ] {
            assert_eq!(CacheType::from_wire_code(t.to_wire_code()).unwrap(), t);
        }
        assert!(CacheType::from_wire_code(99).is_err());
    }

    #[test]
    fn replacement_parses_case_insensitively() {
        assert_eq!("LRU".parse::<Replacement>().unwrap(), Replacement::Lru);
        assert_eq!("lfu".parse::<Replacement>().unwrap(), Replacement::Lfu);
        assert_eq!("Fifo".parse::<Replacement>().unwrap(), Replacement::Fifo);
        assert!("mru".parse::<Replacement>().is_err());
    }
}
