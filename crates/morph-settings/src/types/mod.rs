//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so partial JSON files are accepted; missing fields get their default.

mod engine;
mod logging;

pub use engine::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Shortest allowed interval for timer-driven producers.
pub const MIN_INTERVAL_MS: u64 = 10;

/// Longest allowed interval for timer-driven producers (one hour).
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Root settings type.
///
/// ```json
/// {
///   "logging": { "level": "morph_engine=debug" },
///   "producers": { "defaultIntervalMs": 250 },
///   "rules": { "files": ["/etc/morph/rules.json"] }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MorphSettings {
    /// Settings schema version.
    pub version: String,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Engine behavior.
    pub engine: EngineSettings,
    /// Producer defaults.
    pub producers: ProducerSettings,
    /// Rule sources loaded at startup.
    pub rules: RuleSettings,
}

impl Default for MorphSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            logging: LoggingSettings::default(),
            engine: EngineSettings::default(),
            producers: ProducerSettings::default(),
            rules: RuleSettings::default(),
        }
    }
}

impl MorphSettings {
    /// Check values that the type system cannot.
    pub fn validate(&self) -> Result<()> {
        let interval = self.producers.default_interval_ms;
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval) {
            return Err(SettingsError::InvalidValue(format!(
                "producers.defaultIntervalMs must be within {MIN_INTERVAL_MS}..={MAX_INTERVAL_MS}, got {interval}"
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: MorphSettings =
            serde_json::from_str(r#"{"engine": {"isolateStrategyErrors": false}}"#).unwrap();
        assert!(!settings.engine.isolate_strategy_errors);
        assert!(settings.engine.prune_dead_handlers);
        assert_eq!(settings.producers.default_interval_ms, 1000);
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(MorphSettings::default()).unwrap();
        assert_eq!(v["producers"]["defaultIntervalMs"], 1000);
        assert_eq!(v["engine"]["pruneDeadHandlers"], true);
    }

    #[test]
    fn validate_rejects_tiny_interval() {
        let mut settings = MorphSettings::default();
        settings.producers.default_interval_ms = 1;
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_blank_level() {
        let mut settings = MorphSettings::default();
        settings.logging.level = "  ".to_string();
        assert!(settings.validate().is_err());
    }
}
