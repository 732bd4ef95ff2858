//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MorphSettings::default()`]
//! 2. If `~/.morph/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{MAX_INTERVAL_MS, MIN_INTERVAL_MS, MorphSettings};

/// Resolve the path to the settings file (`~/.morph/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".morph").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MorphSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or an out-of-range value, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<MorphSettings> {
    load_with_overrides(path, |name| std::env::var(name).ok())
}

fn load_with_overrides<F>(path: &Path, lookup: F) -> Result<MorphSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(MorphSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MorphSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `MORPH_*` environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut MorphSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

fn apply_overrides<F>(settings: &mut MorphSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let boolean = |name: &str| {
        let val = lookup(name)?;
        let parsed = parse_bool(&val);
        if parsed.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        parsed
    };

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("MORPH_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = boolean("MORPH_LOG_JSON") {
        settings.logging.json = v;
    }

    // ── Engine ──────────────────────────────────────────────────────
    if let Some(v) = boolean("MORPH_ISOLATE_STRATEGY_ERRORS") {
        settings.engine.isolate_strategy_errors = v;
    }
    if let Some(v) = boolean("MORPH_PRUNE_DEAD_HANDLERS") {
        settings.engine.prune_dead_handlers = v;
    }

    // ── Producers ───────────────────────────────────────────────────
    if let Some(val) = lookup("MORPH_DEFAULT_INTERVAL_MS") {
        match parse_u64_range(&val, MIN_INTERVAL_MS, MAX_INTERVAL_MS) {
            Some(v) => settings.producers.default_interval_ms = v,
            None => {
                tracing::warn!(key = "MORPH_DEFAULT_INTERVAL_MS", value = %val, "invalid u64 env var, ignoring");
            }
        }
    }

    // ── Rules ───────────────────────────────────────────────────────
    if let Some(v) = string("MORPH_RULE_FILES") {
        settings.rules.files = std::env::split_paths(&v)
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty())
            .collect();
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        env(&[])
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"engine": {"a": true, "b": true}});
        let source = serde_json::json!({"engine": {"b": false}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["engine"]["a"], true);
        assert_eq!(merged["engine"]["b"], false);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"files": ["a", "b"]});
        let source = serde_json::json!({"files": ["c"]});
        assert_eq!(deep_merge(target, source)["files"], serde_json::json!(["c"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    // ── load ────────────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with_overrides(Path::new("/nonexistent/settings.json"), no_env()).unwrap();
        assert_eq!(settings.producers.default_interval_ms, 1000);
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"producers": {"defaultIntervalMs": 250}, "rules": {"files": ["/r.json"]}}"#,
        )
        .unwrap();

        let settings = load_with_overrides(&path, no_env()).unwrap();
        assert_eq!(settings.producers.default_interval_ms, 250);
        assert_eq!(settings.rules.files, vec!["/r.json".to_string()]);
        assert!(settings.engine.isolate_strategy_errors);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_with_overrides(&path, no_env());
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_out_of_range_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"producers": {"defaultIntervalMs": 0}}"#).unwrap();

        let result = load_with_overrides(&path, no_env());
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"logging": {"level": "info"}}"#).unwrap();

        let lookup = env(&[
            ("MORPH_LOG_LEVEL", "morph_engine=debug"),
            ("MORPH_ISOLATE_STRATEGY_ERRORS", "off"),
            ("MORPH_DEFAULT_INTERVAL_MS", "50"),
        ]);
        let settings = load_with_overrides(&path, lookup).unwrap();
        assert_eq!(settings.logging.level, "morph_engine=debug");
        assert!(!settings.engine.isolate_strategy_errors);
        assert_eq!(settings.producers.default_interval_ms, 50);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = MorphSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("MORPH_PRUNE_DEAD_HANDLERS", "maybe"),
                ("MORPH_DEFAULT_INTERVAL_MS", "5"),
                ("MORPH_LOG_LEVEL", ""),
            ]),
        );
        assert!(settings.engine.prune_dead_handlers);
        assert_eq!(settings.producers.default_interval_ms, 1000);
        assert_eq!(settings.logging.level, "warn");
    }

    #[cfg(unix)]
    #[test]
    fn rule_files_split_on_path_separator() {
        let mut settings = MorphSettings::default();
        apply_overrides(&mut settings, env(&[("MORPH_RULE_FILES", "/a.json:/b.json")]));
        assert_eq!(settings.rules.files, vec!["/a.json".to_string(), "/b.json".to_string()]);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "ON"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("10", 10, 100), Some(10));
        assert_eq!(parse_u64_range("9", 10, 100), None);
        assert_eq!(parse_u64_range("101", 10, 100), None);
        assert_eq!(parse_u64_range("abc", 10, 100), None);
    }
}
