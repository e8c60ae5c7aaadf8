//! INI parsing: `Ini` → [`Settings`].
//!
//! Starts from defaults and overlays every recognized key found in the file.
//! Unknown sections and keys are ignored so configurations can be shared
//! with the external frontend components.

use ini::Ini;

use super::keys::ConfigKey;
use super::settings::Settings;
use super::ConfigError;

/// Overlay the values of an INI document onto `settings`.
pub(super) fn apply_ini(settings: &mut Settings, ini: &Ini) -> Result<(), ConfigError> {
    for key in ConfigKey::all() {
        if let Some(value) = ini
            .section(Some(key.section()))
            .and_then(|s| s.get(key.key_name()))
        {
            key.set(settings, value)?;
        }
    }
    Ok(())
}

/// Parse an INI document into settings, starting from defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    apply_ini(&mut settings, ini)?;
    Ok(settings)
}
