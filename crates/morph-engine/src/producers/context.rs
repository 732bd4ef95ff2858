//! In-memory context producer.

use std::sync::Arc;
use std::time::Duration;

use morph_core::ContextParameter;
use parking_lot::Mutex;
use tracing::trace;

use crate::errors::Result;
use crate::producer::{Refresh, Snapshot, SnapshotCell, SnapshotObserver, SnapshotProducer, UpdateMode};
use crate::producers::interval::IntervalDriver;
use crate::topic::Subscription;

/// A context producer backed by an in-memory parameter list.
///
/// Mutations never publish on their own. In [`UpdateMode::Event`] the owner
/// calls [`update_snapshot`](Refresh::update_snapshot) after mutating; in
/// [`UpdateMode::Interval`] a timer does it on every tick.
pub struct ContextProvider {
    name: String,
    cell: SnapshotCell<ContextParameter>,
    mode: UpdateMode,
    driver: Mutex<Option<IntervalDriver>>,
}

impl ContextProvider {
    /// Create an event-driven provider with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parameters(name, Vec::new())
    }

    /// Create an event-driven provider seeded with `parameters`.
    pub fn with_parameters(name: impl Into<String>, parameters: Vec<ContextParameter>) -> Self {
        Self {
            name: name.into(),
            cell: SnapshotCell::new(parameters),
            mode: UpdateMode::Event,
            driver: Mutex::new(None),
        }
    }

    /// Create a provider that republishes every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn interval(
        name: impl Into<String>,
        parameters: Vec<ContextParameter>,
        period: Duration,
    ) -> Result<Arc<Self>> {
        let provider = Arc::new(Self {
            name: name.into(),
            cell: SnapshotCell::new(parameters),
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

    /// Current parameters.
    pub fn parameters(&self) -> Snapshot<ContextParameter> {
        self.cell.snapshot()
    }

    /// Insert a parameter, replacing this provider's entry with the same key.
    pub fn set_parameter(&self, parameter: ContextParameter) {
        self.cell.mutate(|params| {
            match params.iter_mut().find(|p| p.key == parameter.key) {
                Some(existing) => *existing = parameter,
                None => params.push(parameter),
            }
        });
    }

    /// Remove this provider's parameter with the given key.
    pub fn remove_parameter(&self, key: &str) -> bool {
        self.cell.mutate(|params| {
            let before = params.len();
            params.retain(|p| p.key != key);
            params.len() != before
        })
    }

    /// Replace the whole parameter list.
    pub fn replace_parameters(&self, parameters: Vec<ContextParameter>) {
        self.cell.mutate(|params| *params = parameters);
    }

    /// Stop the interval timer, if any. Event-driven updates keep working.
    pub fn stop(&self) {
        if let Some(driver) = self.driver.lock().take() {
            driver.stop();
        }
    }
}

impl SnapshotProducer<ContextParameter> for ContextProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&self, observer: SnapshotObserver<ContextParameter>) -> Subscription {
        self.cell.observe(observer)
    }
}

impl Refresh for ContextProvider {
    fn update_snapshot(&self) -> usize {
        let observers = self.cell.publish();
        trace!(producer = %self.name, observers, "context snapshot published");
        observers
    }
}

impl std::fmt::Debug for ContextProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProvider")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("cell", &self.cell)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
