//! # morph-settings
//!
//! Configuration management with layered sources for the Morph engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MorphSettings::default()`]
//! 2. **User file**: `~/.morph/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MORPH_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use morph_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("interval: {}ms", settings.producers.default_interval_ms);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<MorphSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.morph/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static MorphSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: MorphSettings) -> std::result::Result<(), MorphSettings> {
    SETTINGS.set(settings)
}
