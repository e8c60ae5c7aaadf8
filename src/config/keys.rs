//! Configuration key access and validation.
//!
//! Each recognized option maps to one field of [`Settings`] and knows how to
//! get and set its value as a string, validated by a small specification.

use std::str::FromStr;

use super::settings::{CacheKind, Settings};
use super::size::{format_size, parse_size};
use super::ConfigError;
use crate::cache::{CachingStrategy, Replacement};

/// Recognized configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    CacheEnabled,
    CacheType,
    CacheStrategy,
    CacheReplacement,
    CacheRasterSize,
    CachePointsSize,
    CacheLinesSize,
    CachePolygonsSize,
    CachePlotsSize,
    CacheProvenanceSize,
    IndexServerHost,
    IndexServerPort,
    FcgiThreads,
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cache.enabled" => Ok(ConfigKey::CacheEnabled),
            "cache.type" => Ok(ConfigKey::CacheType),
            "cache.strategy" => Ok(ConfigKey::CacheStrategy),
            "cache.replacement" => Ok(ConfigKey::CacheReplacement),
            "cache.raster.size" => Ok(ConfigKey::CacheRasterSize),
            "cache.points.size" => Ok(ConfigKey::CachePointsSize),
            "cache.lines.size" => Ok(ConfigKey::CacheLinesSize),
            "cache.polygons.size" => Ok(ConfigKey::CachePolygonsSize),
            "cache.plots.size" => Ok(ConfigKey::CachePlotsSize),
            "cache.provenance.size" => Ok(ConfigKey::CacheProvenanceSize),
            "indexserver.host" => Ok(ConfigKey::IndexServerHost),
            "indexserver.port" => Ok(ConfigKey::IndexServerPort),
            "fcgi.threads" => Ok(ConfigKey::FcgiThreads),
            _ => Err(ConfigError::UnknownKey(s.to_string())),
        }
    }
}

impl ConfigKey {
    /// The canonical key name (e.g. "cache.raster.size").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::CacheEnabled => "cache.enabled",
            ConfigKey::CacheType => "cache.type",
            ConfigKey::CacheStrategy => "cache.strategy",
            ConfigKey::CacheReplacement => "cache.replacement",
            ConfigKey::CacheRasterSize => "cache.raster.size",
            ConfigKey::CachePointsSize => "cache.points.size",
            ConfigKey::CacheLinesSize => "cache.lines.size",
            ConfigKey::CachePolygonsSize => "cache.polygons.size",
            ConfigKey::CachePlotsSize => "cache.plots.size",
            ConfigKey::CacheProvenanceSize => "cache.provenance.size",
            ConfigKey::IndexServerHost => "indexserver.host",
            ConfigKey::IndexServerPort => "indexserver.port",
            ConfigKey::FcgiThreads => "fcgi.threads",
        }
    }

    /// The section name (e.g. "cache").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// The key within its section (e.g. "raster.size").
    pub fn key_name(&self) -> &'static str {
        self.name()
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or(self.name())
    }

    /// Read the current value as a string.
    pub fn get(&self, settings: &Settings) -> String {
        match self {
            ConfigKey::CacheEnabled => settings.cache.enabled.to_string(),
            ConfigKey::CacheType => settings.cache.kind.as_str().to_string(),
            ConfigKey::CacheStrategy => settings.cache.strategy.as_str().to_string(),
            ConfigKey::CacheReplacement => settings.cache.replacement.as_str().to_string(),
            ConfigKey::CacheRasterSize => format_size(settings.cache.raster_size),
            ConfigKey::CachePointsSize => format_size(settings.cache.points_size),
            ConfigKey::CacheLinesSize => format_size(settings.cache.lines_size),
            ConfigKey::CachePolygonsSize => format_size(settings.cache.polygons_size),
            ConfigKey::CachePlotsSize => format_size(settings.cache.plots_size),
            ConfigKey::CacheProvenanceSize => format_size(settings.cache.provenance_size),
            ConfigKey::IndexServerHost => settings.indexserver.host.clone(),
            ConfigKey::IndexServerPort => settings.indexserver.port.to_string(),
            ConfigKey::FcgiThreads => settings.fcgi.threads.to_string(),
        }
    }

    /// Validate and set the value.
    pub fn set(&self, settings: &mut Settings, value: &str) -> Result<(), ConfigError> {
        self.validate(value)?;
        // Validation guarantees the parses below succeed.
        match self {
            ConfigKey::CacheEnabled => settings.cache.enabled = parse_bool(value),
            ConfigKey::CacheType => settings.cache.kind = value.parse::<CacheKind>().unwrap(),
            ConfigKey::CacheStrategy => {
                settings.cache.strategy = value.parse::<CachingStrategy>().unwrap()
            }
            ConfigKey::CacheReplacement => {
                settings.cache.replacement = value.parse::<Replacement>().unwrap()
            }
            ConfigKey::CacheRasterSize => settings.cache.raster_size = parse_size(value).unwrap(),
            ConfigKey::CachePointsSize => settings.cache.points_size = parse_size(value).unwrap(),
            ConfigKey::CacheLinesSize => settings.cache.lines_size = parse_size(value).unwrap(),
            ConfigKey::CachePolygonsSize => {
                settings.cache.polygons_size = parse_size(value).unwrap()
            }
            ConfigKey::CachePlotsSize => settings.cache.plots_size = parse_size(value).unwrap(),
            ConfigKey::CacheProvenanceSize => {
                settings.cache.provenance_size = parse_size(value).unwrap()
            }
            ConfigKey::IndexServerHost => settings.indexserver.host = value.to_string(),
            ConfigKey::IndexServerPort => settings.indexserver.port = value.parse().unwrap(),
            ConfigKey::FcgiThreads => settings.fcgi.threads = value.parse().unwrap(),
        }
        Ok(())
    }

    /// Check a value against this key's specification.
    pub fn validate(&self, value: &str) -> Result<(), ConfigError> {
        self.specification()
            .is_satisfied_by(value)
            .map_err(|reason| ConfigError::InvalidValue {
                key: self.name().to_string(),
                value: value.to_string(),
                reason,
            })
    }

    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::CacheEnabled => Box::new(BooleanSpec),
            ConfigKey::CacheType => Box::new(OneOfSpec::new(&["local", "remote"])),
            ConfigKey::CacheStrategy => Box::new(OneOfSpec::new(&["always", "never"])),
            ConfigKey::CacheReplacement => Box::new(OneOfSpec::new(&["lru", "lfu", "fifo"])),
            ConfigKey::CacheRasterSize
            | ConfigKey::CachePointsSize
            | ConfigKey::CacheLinesSize
            | ConfigKey::CachePolygonsSize
            | ConfigKey::CachePlotsSize
            | ConfigKey::CacheProvenanceSize => Box::new(SizeSpec),
            ConfigKey::IndexServerHost => Box::new(NonEmptySpec),
            ConfigKey::IndexServerPort => Box::new(PortSpec),
            ConfigKey::FcgiThreads => Box::new(PositiveIntegerSpec),
        }
    }

    /// All recognized keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::CacheEnabled,
            ConfigKey::CacheType,
            ConfigKey::CacheStrategy,
            ConfigKey::CacheReplacement,
            ConfigKey::CacheRasterSize,
            ConfigKey::CachePointsSize,
            ConfigKey::CacheLinesSize,
            ConfigKey::CachePolygonsSize,
            ConfigKey::CachePlotsSize,
            ConfigKey::CacheProvenanceSize,
            ConfigKey::IndexServerHost,
            ConfigKey::IndexServerPort,
            ConfigKey::FcgiThreads,
        ]
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

trait ValueSpecification {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

struct BooleanSpec;

impl ValueSpecification for BooleanSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let valid = ["true", "false", "yes", "no", "1", "0", "on", "off"];
        if valid.contains(&value.to_lowercase().as_str()) {
            Ok(())
        } else {
            Err("must be true/false, yes/no, 1/0, or on/off".to_string())
        }
    }
}

struct OneOfSpec {
    options: &'static [&'static str],
}

impl OneOfSpec {
    fn new(options: &'static [&'static str]) -> Self {
        Self { options }
    }
}

impl ValueSpecification for OneOfSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let lower = value.to_lowercase();
        if self.options.iter().any(|opt| *opt == lower) {
            Ok(())
        } else {
            Err(format!("must be one of: {}", self.options.join(", ")))
        }
    }
}

struct SizeSpec;

impl ValueSpecification for SizeSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        parse_size(value)
            .map(|_| ())
            .map_err(|_| "must be a size like '2GB', '500MB' or '1024KB'".to_string())
    }
}

struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

struct PortSpec;

impl ValueSpecification for PortSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        value
            .parse::<u16>()
            .map(|_| ())
            .map_err(|_| "must be a port number (0-65535)".to_string())
    }
}

struct NonEmptySpec;

impl ValueSpecification for NonEmptySpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err("must not be empty".to_string())
        } else {
            Ok(())
        }
    }
}
