//! In-memory rule set producer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use morph_core::{AdaptationRule, load_rules_from_path};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::errors::Result;
use crate::producer::{
    Refresh, RuleProducer, Snapshot, SnapshotCell, SnapshotObserver, SnapshotProducer, UpdateMode,
};
use crate::producers::interval::IntervalDriver;
use crate::topic::Subscription;

/// A rule producer backed by an in-memory rule list.
///
/// [`add_rule`](RuleProducer::add_rule), [`remove_rule`](RuleProducer::remove_rule)
/// and [`replace_rules`](RuleProvider::replace_rules) publish immediately.
/// [`update_snapshot`](Refresh::update_snapshot) republishes the current list.
pub struct RuleProvider {
    name: String,
    cell: SnapshotCell<AdaptationRule>,
    mode: UpdateMode,
    driver: Mutex<Option<IntervalDriver>>,
}

impl RuleProvider {
    /// Create an event-driven provider with no rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rules(name, Vec::new())
    }

    /// Create an event-driven provider seeded with `rules`. Nothing is published.
    pub fn with_rules(name: impl Into<String>, rules: Vec<AdaptationRule>) -> Self {
        Self {
            name: name.into(),
            cell: SnapshotCell::new(rules),
            mode: UpdateMode::Event,
            driver: Mutex::new(None),
        }
    }

    /// Create an event-driven provider from a JSON rule definition file.
    pub fn from_path(name: impl Into<String>, path: &Path) -> Result<Self> {
        let rules = load_rules_from_path(path)?;
        Ok(Self::with_rules(name, rules))
    }

    /// Create a provider that republishes every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn interval(
        name: impl Into<String>,
        rules: Vec<AdaptationRule>,
        period: Duration,
    ) -> Result<Arc<Self>> {
        let provider = Arc::new(Self {
            name: name.into(),
            cell: SnapshotCell::new(rules),
            mode: UpdateMode::Interval(period),
            driver: Mutex::new(None),
        });
        let driver = IntervalDriver::spawn(&provider.name, Arc::downgrade(&provider), period)?;
        *provider.driver.lock() = Some(driver);
        Ok(provider)
    }

    /// Update discipline chosen at construction.
    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    /// Current rules.
    pub fn rules(&self) -> Snapshot<AdaptationRule> {
        self.cell.snapshot()
    }

    /// Replace the whole rule list and publish.
    pub fn replace_rules(&self, rules: Vec<AdaptationRule>) -> usize {
        self.cell.mutate(|current| *current = rules);
        self.update_snapshot()
    }

    /// Stop the interval timer, if any.
    pub fn stop(&self) {
        if let Some(driver) = self.driver.lock().take() {
            driver.stop();
        }
    }
}

impl SnapshotProducer<AdaptationRule> for RuleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&self, observer: SnapshotObserver<AdaptationRule>) -> Subscription {
        self.cell.observe(observer)
    }
}

impl RuleProducer for RuleProvider {
    fn add_rule(&self, rule: AdaptationRule) {
        debug!(producer = %self.name, rule = %rule.name, "adding rule");
        self.cell.mutate(|rules| rules.push(rule));
        let _ = self.update_snapshot();
    }

    fn remove_rule(&self, name: &str) -> bool {
        let removed = self.cell.mutate(|rules| {
            let before = rules.len();
            rules.retain(|r| r.name != name);
            before - rules.len()
        });
        if removed == 0 {
            trace!(producer = %self.name, rule = name, "remove_rule: no such rule");
            return false;
        }
        debug!(producer = %self.name, rule = name, removed, "removed rule");
        let _ = self.update_snapshot();
        true
    }
}

impl Refresh for RuleProvider {
    fn update_snapshot(&self) -> usize {
        let observers = self.cell.publish();
        trace!(producer = %self.name, observers, "rule snapshot published");
        observers
    }
}

impl std::fmt::Debug for RuleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleProvider")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("cell", &self.cell)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
