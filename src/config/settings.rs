//! The settings structure and its defaults.

use std::str::FromStr;

use crate::cache::{CacheError, CachingStrategy, Replacement};

/// Where cached results live: in this process or behind an index server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKind {
    #[default]
    Local,
    Remote,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Local => "local",
            CacheKind::Remote => "remote",
        }
    }
}

impl FromStr for CacheKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(CacheKind::Local),
            "remote" => Ok(CacheKind::Remote),
            other => Err(CacheError::Argument(format!(
                "unknown cache type '{other}', expected local or remote"
            ))),
        }
    }
}

/// `[cache]` section: switch, placement, gating and per-type byte budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub kind: CacheKind,
    pub strategy: CachingStrategy,
    pub replacement: Replacement,
    pub raster_size: u64,
    pub points_size: u64,
    pub lines_size: u64,
    pub polygons_size: u64,
    pub plots_size: u64,
    /// Recognized for compatibility; no provenance cache exists.
    pub provenance_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: CacheKind::Local,
            strategy: CachingStrategy::Always,
            replacement: Replacement::Lru,
            raster_size: 512 * 1024 * 1024,
            points_size: 64 * 1024 * 1024,
            lines_size: 64 * 1024 * 1024,
            polygons_size: 64 * 1024 * 1024,
            plots_size: 16 * 1024 * 1024,
            provenance_size: 16 * 1024 * 1024,
        }
    }
}

/// `[indexserver]` section: the remote index endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for IndexServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 10_042,
        }
    }
}

/// `[fcgi]` section: frontend worker threads. The frontend itself is an
/// external concern; the value is only parsed and carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcgiSettings {
    pub threads: usize,
}

impl Default for FcgiSettings {
    fn default() -> Self {
        Self { threads: 4 }
    }
}

/// All recognized configuration, with defaults for everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub indexserver: IndexServerSettings,
    pub fcgi: FcgiSettings,
}
