//! Configuration: the options bag of the server core.
//!
//! Settings come from layered INI files, later layers overriding earlier
//! ones: built-in defaults, `/etc/terrastream.conf`, `~/.terrastream.conf`,
//! `./terrastream.conf`, and finally an explicit file named by the
//! `TERRASTREAM_CONFIGURATION` environment variable. Missing files are
//! skipped silently; malformed files are errors.

mod keys;
mod parser;
mod settings;
mod size;

pub use keys::ConfigKey;
pub use settings::{CacheKind, CacheSettings, FcgiSettings, IndexServerSettings, Settings};
pub use size::{format_size, parse_size, SizeParseError};

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable naming an explicit configuration file.
pub const CONFIGURATION_ENV: &str = "TERRASTREAM_CONFIGURATION";

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl Settings {
    /// Parse settings from an INI document.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e))?;
        parser::parse_ini(&ini)
    }

    /// Load settings from one file, starting from defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        settings.overlay_file(path.as_ref())?;
        Ok(settings)
    }

    /// Overlay one file onto existing settings.
    fn overlay_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let ini = Ini::load_from_str(&content).map_err(|e| ConfigError::Parse(e))?;
        parser::apply_ini(self, &ini)?;
        debug!(path = %path.display(), "applied configuration file");
        Ok(())
    }

    /// Load the layered default configuration.
    ///
    /// Files that do not exist are skipped; files that exist but fail to
    /// parse or validate are reported with a warning and skipped, so one
    /// broken layer cannot take the whole configuration down.
    pub fn load_default_paths() -> Self {
        let mut settings = Settings::default();

        let mut paths: Vec<PathBuf> = vec![PathBuf::from("/etc/terrastream.conf")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".terrastream.conf"));
        }
        paths.push(PathBuf::from("./terrastream.conf"));
        if let Ok(explicit) = std::env::var(CONFIGURATION_ENV) {
            if !explicit.is_empty() {
                paths.push(PathBuf::from(explicit));
            }
        }

        for path in paths {
            if !path.is_file() {
                continue;
            }
            if let Err(e) = settings.overlay_file(&path) {
                warn!(path = %path.display(), "skipping configuration file: {e}");
            }
        }
        settings
    }
}
