use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine behavior switches.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Report strategy errors as diagnostics instead of surfacing them to
    /// the caller of an explicit evaluation.
    pub isolate_strategy_errors: bool,
    /// Drop dispatcher subscriptions whose handler has been dropped.
    pub prune_dead_handlers: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            isolate_strategy_errors: true,
            prune_dead_handlers: true,
        }
    }
}

/// Defaults for snapshot producers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProducerSettings {
    /// Tick period for interval-driven producers that don't set their own.
    pub default_interval_ms: u64,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            default_interval_ms: 1000,
        }
    }
}

impl ProducerSettings {
    /// Default interval as a [`Duration`].
    #[must_use]
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }
}

/// Rule definition files loaded at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleSettings {
    /// Paths of JSON rule definition files, in registration order.
    pub files: Vec<String>,
}

impl RuleSettings {
    /// Rule file paths.
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(PathBuf::from)
    }
}
